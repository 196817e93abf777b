use std::sync::atomic::Ordering;

use parley_domain::Message;
use parley_service::{Error, ResyncReport};

use super::{VecSource, harness, message, test_config};

fn messages(count: usize) -> Vec<Message> {
	(1..=count)
		.map(|idx| message(&format!("m{idx}"), "general", &format!("Deploy note {idx}."), 5, None))
		.collect()
}

#[tokio::test]
async fn resync_pages_through_the_source_and_skips_invalid_messages() {
	let h = harness(test_config());
	let mut all = messages(5);

	all[2].user_id = String::new();

	let source = VecSource::new(all);
	let report = h.service.resync(&source, 2).await.expect("Resync failed.");

	assert_eq!(report, ResyncReport { pages: 3, indexed: 4, failed: 1 });
	assert_eq!(
		h.index.record_ids(),
		vec!["m1_chunk_0", "m2_chunk_0", "m4_chunk_0", "m5_chunk_0"]
	);
}

#[tokio::test]
async fn an_exactly_full_last_page_needs_one_more_fetch() {
	let h = harness(test_config());
	let source = VecSource::new(messages(4));
	let report = h.service.resync(&source, 2).await.expect("Resync failed.");

	assert_eq!(report, ResyncReport { pages: 2, indexed: 4, failed: 0 });
	assert_eq!(source.pages_served.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn write_failures_are_counted_not_raised() {
	let h = harness(test_config());

	h.index.fail_upsert.store(true, Ordering::SeqCst);

	let source = VecSource::new(messages(3));
	let report = h.service.resync(&source, 5).await.expect("Resync failed.");

	assert_eq!(report, ResyncReport { pages: 1, indexed: 0, failed: 3 });
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
	let h = harness(test_config());
	let source = VecSource::new(messages(1));
	let err = h.service.resync(&source, 0).await.expect_err("Zero page size.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(source.pages_served.load(Ordering::SeqCst), 0);
}
