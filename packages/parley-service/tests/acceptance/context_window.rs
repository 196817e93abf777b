use std::sync::atomic::Ordering;

use parley_service::{ContextRequest, ContextWindow, RankedMessage, SimilarityOptions};

use super::{harness, message, now, test_config};

fn request(channel_id: &str, max_tokens: Option<u32>, related: bool) -> ContextRequest {
	ContextRequest {
		channel_id: channel_id.to_string(),
		prompt: "What happened to login?".to_string(),
		max_tokens,
		include_related_channels: related,
		min_score: None,
	}
}

fn eighty_chars(tag: &str) -> String {
	let text = format!("login {tag} {}", "x".repeat(80));

	text.chars().take(80).collect()
}

#[tokio::test]
async fn window_fills_in_rank_order_up_to_the_budget() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", &eighty_chars("one"), 5, None),
		message("m2", "general", &eighty_chars("two"), 10, None),
		message("m3", "general", &eighty_chars("three"), 15, None),
	])
	.await;

	let window = h.service.get_context_window_at(&request("general", Some(50), false), now()).await;

	assert_eq!(window.messages.len(), 2);
	assert_eq!(window.total_tokens, 40);
	assert_eq!(
		window.messages.iter().map(|item| item.message_id.as_str()).collect::<Vec<_>>(),
		vec!["m1", "m2"]
	);
	assert_eq!(window.touched_channels.iter().collect::<Vec<_>>(), vec!["general"]);
}

#[tokio::test]
async fn related_channels_rank_like_an_unscoped_search() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", "Login broke after the release.", 5, None),
		message("m2", "ops", "Login broke on the ops dashboard.", 5, None),
	])
	.await;

	let narrow = h.service.get_context_window_at(&request("general", None, false), now()).await;
	let wide = h.service.get_context_window_at(&request("general", None, true), now()).await;
	let unscoped = h
		.service
		.find_similar_messages_at(
			"What happened to login?",
			&SimilarityOptions { min_score: Some(0.7), ..Default::default() },
			now(),
		)
		.await
		.expect("Search failed.");
	let scores = |items: &[RankedMessage]| {
		items.iter().map(|item| (item.message_id.clone(), item.final_score)).collect::<Vec<_>>()
	};

	assert_eq!(narrow.messages.len(), 1);
	assert_eq!(narrow.messages[0].channel_score, 1.2);
	assert_eq!(wide.messages.len(), 2);
	assert!(wide.messages.iter().all(|item| item.channel_score == 1.0));
	assert_eq!(scores(&wide.messages), scores(&unscoped));
	assert_eq!(wide.touched_channels.iter().collect::<Vec<_>>(), vec!["general", "ops"]);
}

#[tokio::test]
async fn retrieval_failures_yield_an_empty_window() {
	let h = harness(test_config());

	h.index_all(&[message("m1", "general", "Login broke.", 5, None)]).await;
	h.embedding.fail.store(true, Ordering::SeqCst);

	let window = h.service.get_context_window_at(&request("general", None, false), now()).await;

	assert_eq!(window, ContextWindow::default());
}

#[tokio::test]
async fn unrelated_messages_stay_out_of_the_window() {
	let h = harness(test_config());

	h.index_all(&[message("m1", "general", "Billing export is stuck.", 5, None)]).await;

	let window = h.service.get_context_window_at(&request("general", None, false), now()).await;

	assert!(window.messages.is_empty());
	assert_eq!(window.total_tokens, 0);
	assert!(window.touched_channels.is_empty());
}
