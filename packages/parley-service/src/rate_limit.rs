use std::time::Duration;

use parley_storage::rate_limit::PgRateLimitStore;

use crate::{BoxFuture, Error, ParleyService, RateLimitStore, Result};

impl RateLimitStore for PgRateLimitStore {
	fn increment<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> BoxFuture<'a, parley_storage::Result<u64>> {
		Box::pin(PgRateLimitStore::increment(self, key, window))
	}
}

pub fn rate_limit_key(bucket: &str) -> String {
	format!("rate:{bucket}")
}

impl ParleyService {
	/// Counts one request against the configured bucket and rejects it once the quota is spent.
	///
	/// The rejected request still counts, so a client hammering the limiter stays limited until
	/// the window expires.
	pub async fn check_rate_limit(&self) -> Result<u64> {
		let cfg = &self.cfg.rate_limit;
		let key = rate_limit_key(&cfg.bucket);
		let count =
			self.rate_limits.increment(&key, Duration::from_secs(cfg.window_secs)).await?;

		if count > u64::from(cfg.quota) {
			tracing::warn!(bucket = %cfg.bucket, count, quota = cfg.quota, "Rate limit exceeded.");

			return Err(Error::RateLimitExceeded {
				bucket: cfg.bucket.clone(),
				quota: cfg.quota,
				window_secs: cfg.window_secs,
			});
		}

		Ok(count)
	}
}
