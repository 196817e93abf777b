use std::sync::atomic::Ordering;

use parley_service::{Error, SimilarityOptions};

use super::{harness, long_text, message, now, test_config};

fn in_channel(channel_id: &str) -> SimilarityOptions {
	SimilarityOptions {
		channel_id: Some(channel_id.to_string()),
		min_score: Some(0.5),
		..Default::default()
	}
}

#[tokio::test]
async fn single_channel_scope_filters_and_boosts() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", "Login broke for everyone.", 5, None),
		message("m2", "random", "Login broke for me too.", 5, None),
	])
	.await;

	let results = h
		.service
		.find_similar_messages_at("login", &in_channel("general"), now())
		.await
		.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].message_id, "m1");
	assert_eq!(results[0].channel_score, 1.2);
	assert!(results[0].final_score > results[0].raw_score);
}

#[tokio::test]
async fn channel_lists_filter_without_boosting() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", "Login broke for everyone.", 5, None),
		message("m2", "random", "Login broke for me too.", 5, None),
		message("m3", "ops", "Login broke in staging.", 5, None),
	])
	.await;

	let options = SimilarityOptions {
		channel_ids: Some(vec!["general".to_string(), "random".to_string()]),
		min_score: Some(0.5),
		..Default::default()
	};
	let results =
		h.service.find_similar_messages_at("login", &options, now()).await.expect("Search failed.");
	let mut ids: Vec<_> = results.iter().map(|item| item.message_id.as_str()).collect();

	ids.sort_unstable();

	assert_eq!(ids, vec!["m1", "m2"]);
	assert!(results.iter().all(|item| item.channel_score == 1.0));
}

#[tokio::test]
async fn results_below_min_score_are_dropped() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", "Login broke for everyone.", 5, None),
		message("m2", "general", "Deploy is finished.", 5, None),
	])
	.await;

	let results = h
		.service
		.find_similar_messages_at("login", &in_channel("general"), now())
		.await
		.expect("Search failed.");

	assert_eq!(results.iter().map(|item| item.message_id.as_str()).collect::<Vec<_>>(), vec!["m1"]);
}

#[tokio::test]
async fn candidate_pool_is_oversampled() {
	let h = harness(test_config());

	h.index_all(&[message("m1", "general", "Login broke.", 5, None)]).await;

	let options = SimilarityOptions { top_k: Some(2), ..in_channel("general") };

	h.service.find_similar_messages_at("login", &options, now()).await.expect("Search failed.");

	assert_eq!(h.index.last_query_top_k.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn invalid_queries_are_rejected_before_embedding() {
	let h = harness(test_config());
	let blank = h
		.service
		.find_similar_messages_at("  ", &in_channel("general"), now())
		.await
		.expect_err("Blank query should be rejected.");
	let zero_k = h
		.service
		.find_similar_messages_at(
			"login",
			&SimilarityOptions { top_k: Some(0), ..in_channel("general") },
			now(),
		)
		.await
		.expect_err("Zero top_k should be rejected.");
	let nan_score = h
		.service
		.find_similar_messages_at(
			"login",
			&SimilarityOptions { min_score: Some(f32::NAN), ..in_channel("general") },
			now(),
		)
		.await
		.expect_err("NaN min_score should be rejected.");

	assert!(matches!(blank, Error::Validation { .. }));
	assert!(matches!(zero_k, Error::Validation { .. }));
	assert!(matches!(nan_score, Error::Validation { .. }));
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn replies_carry_their_reconstructed_parent() {
	let h = harness(test_config());
	let parent_text = long_text(12);

	h.index_all(&[
		message("p1", "general", &parent_text, 30, None),
		message("r1", "general", "Login fixed after rotating keys.", 10, Some("p1")),
	])
	.await;

	let results = h
		.service
		.find_similar_messages_at("login", &in_channel("general"), now())
		.await
		.expect("Search failed.");
	let reply = results.iter().find(|item| item.message_id == "r1").expect("Reply missing.");
	let parent = results.iter().find(|item| item.message_id == "p1").expect("Parent missing.");
	let context = reply.parent_context.as_ref().expect("Parent context missing.");

	assert!(h.index.record_ids().len() > 2, "Parent should span several chunks.");
	assert_eq!(context.message_id, "p1");
	assert_eq!(context.user_id, "user-p1");
	assert_eq!(context.content, parent_text);
	assert_eq!(parent.content, parent_text);
	assert!(parent.parent_context.is_none());
	assert!(reply.in_thread && parent.in_thread);
	assert_eq!(reply.thread_score, 1.5);
}

#[tokio::test]
async fn parent_context_ignores_the_channel_scope() {
	let h = harness(test_config());

	h.index_all(&[
		message("p1", "random", "Billing export is stuck.", 30, None),
		message("r1", "general", "Login fixed, billing still stuck.", 10, Some("p1")),
	])
	.await;

	let results = h
		.service
		.find_similar_messages_at("login", &in_channel("general"), now())
		.await
		.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(
		results[0].parent_context.as_ref().map(|parent| parent.content.as_str()),
		Some("Billing export is stuck.")
	);
}

#[tokio::test]
async fn parent_lookup_failures_leave_results_intact() {
	let h = harness(test_config());

	h.index_all(&[
		message("p1", "general", "Login is down.", 30, None),
		message("r1", "general", "Login is back.", 10, Some("p1")),
	])
	.await;
	h.index.fail_fetch.store(true, Ordering::SeqCst);

	let results = h
		.service
		.find_similar_messages_at("login", &in_channel("general"), now())
		.await
		.expect("Search failed.");

	assert_eq!(results.len(), 2);
	assert!(results.iter().all(|item| item.parent_context.is_none()));
}
