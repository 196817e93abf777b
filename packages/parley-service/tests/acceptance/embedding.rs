use std::sync::Arc;

use serde_json::Value;

use parley_providers::generation::ChatMessage;
use parley_service::{Error, GenerationProvider, ParleyService, Providers};

use super::{MemoryIndex, MemoryRateLimits, harness, keyword_vector, test_config};

fn texts(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

#[tokio::test]
async fn empty_input_needs_no_provider_call() {
	let h = harness(test_config());
	let vectors = h.service.embed_batch(&[]).await.expect("Empty embed failed.");

	assert!(vectors.is_empty());
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn blank_text_is_rejected() {
	let h = harness(test_config());
	let err = h
		.service
		.embed_batch(&texts(&["login", " \n "]))
		.await
		.expect_err("Blank text should be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn oversized_inputs_are_truncated() {
	let mut cfg = test_config();

	cfg.providers.embedding.max_input_chars = 10;

	let h = harness(cfg);

	h.service.embed("deploy deploy deploy").await.expect("Embed failed.");

	let inputs = h.embedding.inputs.lock().expect("Inputs lock poisoned.");

	assert_eq!(inputs.as_slice(), ["deploy dep".to_string()]);
}

#[tokio::test]
async fn providers_without_batch_support_get_one_call_per_text() {
	let mut cfg = test_config();

	cfg.providers.embedding.supports_batch = false;

	let h = harness(cfg);
	let input = texts(&["login", "deploy", "billing"]);
	let vectors = h.service.embed_batch(&input).await.expect("Embed failed.");

	assert_eq!(h.embedding.calls(), 3);
	assert_eq!(vectors, input.iter().map(|text| keyword_vector(text)).collect::<Vec<_>>());
}

#[tokio::test]
async fn dimension_mismatch_is_a_provider_error() {
	let h = harness(test_config());

	*h.embedding.dimension_override.lock().expect("Dimension lock poisoned.") = Some(3);

	let err = h.service.embed("login").await.expect_err("Mismatch should be rejected.");

	assert!(matches!(err, Error::Provider(_)));
	assert!(err.to_string().contains("expected 4, got 3"), "Unexpected error: {err}");
}

#[tokio::test]
async fn default_providers_route_to_the_http_clients() {
	let mut cfg = test_config();

	cfg.providers.embedding.default_headers.insert("x-team".to_string(), Value::from(7));
	cfg.providers.llm.default_headers.insert("x-team".to_string(), Value::from(7));

	let providers = Providers::default();
	let generated = providers
		.generation
		.generate(&cfg.providers.llm, &[ChatMessage::user("ping")])
		.await
		.expect_err("A numeric header should be rejected before sending.");
	let service = ParleyService::with_parts(
		cfg,
		Arc::new(MemoryIndex::default()),
		providers,
		Arc::new(MemoryRateLimits::default()),
	);
	let embedded = service.embed("login").await.expect_err("A numeric header should be rejected.");

	assert!(matches!(generated, parley_providers::Error::InvalidConfig { .. }));
	assert!(
		matches!(embedded, Error::Provider(parley_providers::Error::InvalidConfig { .. })),
		"Unexpected error: {embedded:?}"
	);
}
