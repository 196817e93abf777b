use sqlx::{PgPool, Row, postgres::PgRow};
use time::OffsetDateTime;

use parley_domain::Message;

use crate::{Error, Result};

/// Keyset-paginated reader over the chat backend's `messages` table.
#[derive(Clone)]
pub struct PgMessageSource {
	pool: PgPool,
}
impl PgMessageSource {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Returns up to `limit` messages with ids strictly greater than `after`, ordered by id.
	pub async fn page(&self, after: Option<&str>, limit: u32) -> Result<Vec<Message>> {
		if limit == 0 {
			return Err(Error::InvalidArgument("Page limit must be greater than zero.".to_string()));
		}

		let rows = sqlx::query(
			"\
SELECT id, channel_id, user_id, content, created_at, reply_to_id
FROM messages
WHERE ($1::text IS NULL OR id > $1)
ORDER BY id
LIMIT $2",
		)
		.bind(after)
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(message_from_row).collect()
	}
}

fn message_from_row(row: &PgRow) -> Result<Message> {
	let created_at: OffsetDateTime = row.try_get("created_at")?;

	Ok(Message {
		id: row.try_get("id")?,
		channel_id: row.try_get("channel_id")?,
		user_id: row.try_get("user_id")?,
		content: row.try_get("content")?,
		created_at,
		reply_to_id: row.try_get("reply_to_id")?,
	})
}
