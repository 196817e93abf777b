use std::sync::atomic::Ordering;

use parley_service::Error;

use super::{harness, long_text, message, test_config};

#[tokio::test]
async fn reindexing_a_message_overwrites_its_records() {
	let h = harness(test_config());
	let msg = message("m1", "general", "The login page times out after the deploy.", 5, None);

	let first =
		h.service.index_message(&msg.id, &msg.content, msg.metadata()).await.expect("First index.");
	let second =
		h.service.index_message(&msg.id, &msg.content, msg.metadata()).await.expect("Second index.");

	assert_eq!(first, 1);
	assert_eq!(second, 1);
	assert_eq!(h.index.record_ids(), vec!["m1_chunk_0".to_string()]);
}

#[tokio::test]
async fn long_messages_are_written_as_ordered_chunks() {
	let h = harness(test_config());
	let content = long_text(30);
	let msg = message("m1", "general", &content, 5, None);

	let written =
		h.service.index_message(&msg.id, &msg.content, msg.metadata()).await.expect("Index failed.");
	let records = h.index.records.lock().expect("Records lock poisoned.");

	assert!(written > 1);
	assert_eq!(records.len(), written);

	for idx in 0..written {
		let record = records.get(&format!("m1_chunk_{idx}")).expect("Missing chunk record.");

		assert_eq!(record.chunk.chunk_index as usize, idx);
		assert_eq!(record.chunk.total_chunks as usize, written);
		assert!(record.chunk.content.chars().count() <= 512);
	}
}

#[tokio::test]
async fn empty_content_is_rejected_without_embedding() {
	let h = harness(test_config());
	let msg = message("m1", "general", "   ", 5, None);
	let err = h
		.service
		.index_message(&msg.id, &msg.content, msg.metadata())
		.await
		.expect_err("Blank content should be rejected.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error: {err:?}");
	assert_eq!(h.embedding.calls(), 0);
	assert!(h.index.record_ids().is_empty());
}

#[tokio::test]
async fn self_replies_are_rejected() {
	let h = harness(test_config());
	let msg = message("m1", "general", "Replying to myself.", 5, Some("m1"));
	let err = h
		.service
		.index_message(&msg.id, &msg.content, msg.metadata())
		.await
		.expect_err("Self reply should be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
	let h = harness(test_config());
	let results = h.service.index_batch(&[]).await.expect("Empty batch failed.");

	assert!(results.is_empty());
	assert_eq!(h.embedding.calls(), 0);
	assert_eq!(h.index.upsert_calls(), 0);
}

#[tokio::test]
async fn invalid_metadata_rejects_the_whole_batch_before_network_calls() {
	let h = harness(test_config());
	let messages = vec![
		message("m1", "general", "Deploy finished.", 5, None),
		message("m2", " ", "Missing channel.", 5, None),
	];
	let err = h.service.index_batch(&messages).await.expect_err("Batch should be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(h.embedding.calls(), 0);
	assert_eq!(h.index.upsert_calls(), 0);
}

#[tokio::test]
async fn batches_are_split_into_configured_sub_batches() {
	let h = harness(test_config());
	let messages: Vec<_> = (1..=5)
		.map(|idx| message(&format!("m{idx}"), "general", &format!("Billing note {idx}."), 5, None))
		.collect();
	let results = h.service.index_batch(&messages).await.expect("Batch failed.");

	assert_eq!(results.len(), 5);
	assert!(results.iter().all(|result| result.success && result.error.is_none()));
	assert_eq!(
		results.iter().map(|result| result.message_id.as_str()).collect::<Vec<_>>(),
		vec!["m1", "m2", "m3", "m4", "m5"]
	);
	// batch_size = 2 over five single-chunk messages.
	assert_eq!(h.embedding.calls(), 3);
	assert_eq!(h.index.upsert_calls(), 3);
	assert_eq!(h.index.record_ids().len(), 5);
}

#[tokio::test]
async fn blank_messages_fail_individually_inside_a_batch() {
	let h = harness(test_config());
	let messages = vec![
		message("m1", "general", "Deploy finished.", 5, None),
		message("m2", "general", "", 5, None),
	];
	let results = h.service.index_batch(&messages).await.expect("Batch failed.");

	assert!(results[0].success);
	assert!(!results[1].success);
	assert!(results[1].error.is_some());
	assert_eq!(h.index.record_ids(), vec!["m1_chunk_0".to_string()]);
}

#[tokio::test]
async fn a_failed_write_fails_every_message_in_the_batch() {
	let h = harness(test_config());

	h.index.fail_upsert.store(true, Ordering::SeqCst);

	let messages = vec![
		message("m1", "general", "Deploy finished.", 5, None),
		message("m2", "general", "Login restored.", 5, None),
		message("m3", "general", "Billing exported.", 5, None),
	];
	let results = h.service.index_batch(&messages).await.expect("Batch call failed.");

	assert_eq!(results.len(), 3);

	for result in &results {
		assert!(!result.success);
		assert!(
			result.error.as_deref().is_some_and(|error| error.contains("read-only")),
			"Unexpected error: {result:?}"
		);
	}
}

#[tokio::test]
async fn a_failed_embedding_surfaces_as_a_provider_error() {
	let h = harness(test_config());

	h.embedding.fail.store(true, Ordering::SeqCst);

	let msg = message("m1", "general", "Deploy finished.", 5, None);
	let err = h
		.service
		.index_message(&msg.id, &msg.content, msg.metadata())
		.await
		.expect_err("Embedding failure should propagate.");

	assert!(matches!(err, Error::Provider(_)));
	assert_eq!(h.index.upsert_calls(), 0);
}
