use serde::{Deserialize, Serialize};

use parley_domain::Message;
use parley_storage::messages::PgMessageSource;

use crate::{BoxFuture, Error, MessageSource, ParleyService, Result};

impl MessageSource for PgMessageSource {
	fn page<'a>(
		&'a self,
		after: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, parley_storage::Result<Vec<Message>>> {
		Box::pin(PgMessageSource::page(self, after, limit))
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
	pub pages: u32,
	pub indexed: usize,
	pub failed: usize,
}

impl ParleyService {
	/// Re-indexes every message the source yields, one page per `index_batch` call.
	///
	/// Messages with invalid metadata are counted as failed instead of aborting the run. Source
	/// errors stop it.
	pub async fn resync(&self, source: &dyn MessageSource, page_size: u32) -> Result<ResyncReport> {
		if page_size == 0 {
			return Err(Error::validation("page_size must be greater than zero."));
		}

		let mut report = ResyncReport::default();
		let mut after: Option<String> = None;

		loop {
			let page = source.page(after.as_deref(), page_size).await?;
			let Some(last) = page.last() else {
				break;
			};
			let next_after = last.id.clone();
			let (valid, invalid): (Vec<Message>, Vec<Message>) = page
				.into_iter()
				.partition(|message| message.metadata().normalized().validate(&message.id).is_ok());

			for message in &invalid {
				tracing::warn!(message_id = %message.id, "Skipping message with invalid metadata.");
			}

			let results = self.index_batch(&valid).await?;
			let indexed = results.iter().filter(|result| result.success).count();
			let fetched = valid.len() + invalid.len();

			report.pages += 1;
			report.indexed += indexed;
			report.failed += invalid.len() + (results.len() - indexed);

			tracing::info!(
				page = report.pages,
				fetched,
				indexed,
				after = %next_after,
				"Resync page processed."
			);

			if fetched < page_size as usize {
				break;
			}

			after = Some(next_after);
		}

		Ok(report)
	}
}
