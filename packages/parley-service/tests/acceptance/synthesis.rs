use std::sync::atomic::Ordering;

use parley_service::{Error, SynthesisRequest};

use super::{harness, message, test_config};

fn request(prompt: &str) -> SynthesisRequest {
	SynthesisRequest {
		channel_id: "general".to_string(),
		prompt: prompt.to_string(),
		include_related_channels: false,
	}
}

#[tokio::test]
async fn answers_from_the_channel_context() {
	let h = harness(test_config());

	h.index_all(&[
		message("m1", "general", "Login broke after the release.", 5, None),
		message("m2", "general", "Billing export is stuck.", 5, None),
	])
	.await;

	let response = h.service.synthesize(&request("Why did login break?")).await.expect("Synthesis.");
	let sent = h.generation.last_messages.lock().expect("Messages lock poisoned.").clone();

	assert_eq!(response.response, "Answer #1");
	assert_eq!(response.context_message_count, 1);
	assert_eq!(h.generation.calls(), 1);
	assert_eq!(sent.len(), 2);
	assert_eq!(sent[0].role, "system");
	assert_eq!(sent[0].content, "Answer from the context.");
	assert!(sent[1].content.contains("Login broke after the release."));
	assert!(!sent[1].content.contains("Billing export"));
	assert!(sent[1].content.ends_with("Question: Why did login break?"));
}

#[tokio::test]
async fn an_empty_context_still_reaches_the_model() {
	let h = harness(test_config());
	let response = h.service.synthesize(&request("Why did login break?")).await.expect("Synthesis.");
	let sent = h.generation.last_messages.lock().expect("Messages lock poisoned.").clone();

	assert_eq!(response.context_message_count, 0);
	assert!(sent[1].content.starts_with("No related messages were found."));
}

#[tokio::test]
async fn transient_generation_failures_are_retried() {
	let h = harness(test_config());

	h.generation.failures.store(2, Ordering::SeqCst);

	let response = h.service.synthesize(&request("Any login news?")).await.expect("Synthesis.");

	assert_eq!(response.response, "Answer #3");
	assert_eq!(h.generation.calls(), 3);
}

#[tokio::test]
async fn retries_stop_at_the_attempt_limit() {
	let h = harness(test_config());

	h.generation.failures.store(10, Ordering::SeqCst);

	let err = h.service.synthesize(&request("Any login news?")).await.expect_err("Should exhaust.");

	match err {
		Error::SynthesisExhausted { attempts, message } => {
			assert_eq!(attempts, 3);
			assert!(message.contains("call 3"), "Unexpected last error: {message}");
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert_eq!(h.generation.calls(), 3);
}

#[tokio::test]
async fn the_rate_limit_rejects_before_any_work() {
	let mut cfg = test_config();

	cfg.rate_limit.quota = 2;

	let h = harness(cfg);

	h.service.synthesize(&request("First?")).await.expect("First synthesis.");
	h.service.synthesize(&request("Second?")).await.expect("Second synthesis.");

	let embeds_before = h.embedding.calls();
	let err = h.service.synthesize(&request("Third?")).await.expect_err("Should be limited.");

	assert!(
		matches!(err, Error::RateLimitExceeded { quota: 2, window_secs: 60, .. }),
		"Unexpected error: {err:?}"
	);
	assert_eq!(h.embedding.calls(), embeds_before);
	assert_eq!(h.generation.calls(), 2);
	assert_eq!(h.rate_limits.count("rate:synthesis"), 3);
}

#[tokio::test]
async fn invalid_requests_do_not_consume_quota() {
	let h = harness(test_config());
	let err = h.service.synthesize(&request("   ")).await.expect_err("Blank prompt.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(h.rate_limits.count("rate:synthesis"), 0);
	assert_eq!(h.generation.calls(), 0);
}
