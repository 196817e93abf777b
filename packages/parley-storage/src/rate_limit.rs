use std::time::Duration;

use sqlx::PgPool;

use crate::{Error, Result};

/// Fixed-window counters shared by every service instance through Postgres.
#[derive(Clone)]
pub struct PgRateLimitStore {
	pool: PgPool,
}
impl PgRateLimitStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Atomically bumps the counter for `key` and returns the count inside the current window.
	///
	/// The first increment of a window (or the first after expiry) resets the count to 1 and sets
	/// the expiry to `now + window`.
	pub async fn increment(&self, key: &str, window: Duration) -> Result<u64> {
		if key.trim().is_empty() {
			return Err(Error::InvalidArgument("Rate limit key must be non-empty.".to_string()));
		}

		let window_secs = window.as_secs_f64();
		let count: i64 = sqlx::query_scalar(
			"\
INSERT INTO rate_limits (key, count, expires_at)
VALUES ($1, 1, now() + make_interval(secs => $2))
ON CONFLICT (key) DO UPDATE
SET
	count = CASE
		WHEN rate_limits.expires_at <= now() THEN 1
		ELSE rate_limits.count + 1
	END,
	expires_at = CASE
		WHEN rate_limits.expires_at <= now() THEN now() + make_interval(secs => $2)
		ELSE rate_limits.expires_at
	END
RETURNING count",
		)
		.bind(key)
		.bind(window_secs)
		.fetch_one(&self.pool)
		.await?;

		Ok(count.max(0) as u64)
	}

	/// Drops counters whose window has already closed.
	pub async fn purge_expired(&self) -> Result<u64> {
		let result =
			sqlx::query("DELETE FROM rate_limits WHERE expires_at <= now()").execute(&self.pool).await?;

		Ok(result.rows_affected())
	}
}
