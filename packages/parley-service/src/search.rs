pub mod ranking;

use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use parley_domain::{ChannelFilter, SearchCursor, StoredChunk, record_id};

use crate::{Error, ParleyService, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimilarityOptions {
	pub channel_id: Option<String>,
	pub channel_ids: Option<Vec<String>>,
	pub top_k: Option<u32>,
	pub min_score: Option<f32>,
}

/// One message in ranked order with the signals that produced its score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedMessage {
	pub message_id: String,
	pub channel_id: String,
	pub user_id: String,
	pub content: String,
	pub raw_score: f32,
	pub time_score: f32,
	pub channel_score: f32,
	pub thread_score: f32,
	pub final_score: f32,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply_to_id: Option<String>,
	/// Replies to, or is replied to by, another candidate of the same query.
	pub in_thread: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_context: Option<ParentContext>,
}

/// The message a ranked result replies to, rebuilt from its stored chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentContext {
	pub message_id: String,
	pub user_id: String,
	pub content: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub channel_id: Option<String>,
	pub channel_ids: Option<Vec<String>>,
	pub top_k: Option<u32>,
	pub min_score: Option<f32>,
	pub cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub items: Vec<RankedMessage>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next_cursor: Option<String>,
}

/// Which candidates a query may see and which channel earns the channel boost.
pub(crate) struct RetrievalScope {
	pub(crate) filter: ChannelFilter,
	pub(crate) boosted_channel: Option<String>,
}
impl RetrievalScope {
	pub(crate) fn from_filter(filter: ChannelFilter) -> Self {
		let boosted_channel = filter.boosted_channel().map(str::to_string);

		Self { filter, boosted_channel }
	}
}

impl ParleyService {
	pub async fn find_similar_messages(
		&self,
		query: &str,
		options: &SimilarityOptions,
	) -> Result<Vec<RankedMessage>> {
		self.find_similar_messages_at(query, options, OffsetDateTime::now_utc()).await
	}

	/// Same as [`ParleyService::find_similar_messages`] with an explicit clock.
	pub async fn find_similar_messages_at(
		&self,
		query: &str,
		options: &SimilarityOptions,
		now: OffsetDateTime,
	) -> Result<Vec<RankedMessage>> {
		let top_k = options.top_k.unwrap_or(self.cfg.search.top_k);
		let min_score = options.min_score.unwrap_or(self.cfg.search.min_score);
		let scope = RetrievalScope::from_filter(ChannelFilter::from_scope(
			options.channel_id.as_deref(),
			options.channel_ids.as_deref(),
		));
		let mut ranked = self.ranked_candidates(query, &scope, top_k, min_score, now).await?;

		ranked.truncate(top_k as usize);

		self.attach_parent_context(&mut ranked).await;

		Ok(ranked)
	}

	/// Cursor-paginated search over a ranking window of at most `search.max_window` results.
	///
	/// Rankings are recomputed per page, so recency drift between calls can shift items across
	/// page boundaries.
	pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
		self.search_at(req, OffsetDateTime::now_utc()).await
	}

	pub async fn search_at(
		&self,
		req: &SearchRequest,
		now: OffsetDateTime,
	) -> Result<SearchResponse> {
		let top_k = req.top_k.unwrap_or(self.cfg.search.top_k);
		let min_score = req.min_score.unwrap_or(self.cfg.search.min_score);
		let cursor = req.cursor.as_deref().map(SearchCursor::decode).transpose()?;
		let window = self.cfg.search.max_window.max(top_k);
		let scope = RetrievalScope::from_filter(ChannelFilter::from_scope(
			req.channel_id.as_deref(),
			req.channel_ids.as_deref(),
		));
		let mut ranked = self.ranked_candidates(&req.query, &scope, window, min_score, now).await?;

		ranked.truncate(window as usize);

		let start = cursor.as_ref().map(|cursor| resume_position(&ranked, cursor)).unwrap_or(0);
		let end = start.saturating_add(top_k as usize).min(ranked.len());
		let has_more = end < ranked.len();
		let mut items: Vec<RankedMessage> = ranked.drain(start.min(end)..end).collect();
		let next_cursor = match items.last() {
			Some(last) if has_more => Some(cursor_after(last).encode()?),
			_ => None,
		};

		self.attach_parent_context(&mut items).await;

		Ok(SearchResponse { items, next_cursor })
	}

	/// Embeds `query`, pulls an oversampled candidate set, and ranks it without truncating.
	pub(crate) async fn ranked_candidates(
		&self,
		query: &str,
		scope: &RetrievalScope,
		top_k: u32,
		min_score: f32,
		now: OffsetDateTime,
	) -> Result<Vec<RankedMessage>> {
		if query.trim().is_empty() {
			return Err(Error::validation("Query must be non-empty."));
		}
		if top_k == 0 {
			return Err(Error::validation("top_k must be greater than zero."));
		}
		if !min_score.is_finite() {
			return Err(Error::validation("min_score must be a finite number."));
		}

		let vector = self.embed(query).await?;
		let candidate_k = top_k.saturating_mul(self.cfg.ranking.oversample_factor.max(1));
		let candidates = self.index.query(&vector, candidate_k, &scope.filter).await?;
		let candidate_count = candidates.len();
		let ranked = ranking::rank_candidates(
			candidates,
			scope.boosted_channel.as_deref(),
			min_score,
			&self.cfg.ranking,
			now,
		);

		tracing::debug!(candidate_count, ranked = ranked.len(), top_k, "Candidates ranked.");

		Ok(ranked)
	}

	/// Fills `parent_context` for replies. Lookups run concurrently and failures are skipped.
	pub(crate) async fn attach_parent_context(&self, ranked: &mut [RankedMessage]) {
		let lookups = ranked.iter().map(|item| async move {
			let parent_id = item.reply_to_id.as_deref()?;

			match self.fetch_parent(parent_id).await {
				Ok(parent) => parent,
				Err(err) => {
					tracing::warn!(
						message_id = %item.message_id,
						parent_id,
						error = %err,
						"Parent context lookup failed."
					);

					None
				},
			}
		});
		let parents = future::join_all(lookups).await;

		for (item, parent) in ranked.iter_mut().zip(parents) {
			item.parent_context = parent;
		}
	}

	async fn fetch_parent(&self, parent_id: &str) -> Result<Option<ParentContext>> {
		let head_id = record_id(parent_id, 0);
		let Some(head) = self.index.fetch_by_id(&head_id).await? else {
			return Ok(None);
		};
		let mut chunks = vec![head.clone()];

		if head.total_chunks > 1 {
			let rest_ids: Vec<String> =
				(1..head.total_chunks).map(|idx| record_id(parent_id, idx)).collect();
			let rest = future::try_join_all(rest_ids.iter().map(|id| self.index.fetch_by_id(id)))
				.await?;

			chunks.extend(rest.into_iter().flatten());
		}

		Ok(Some(parent_from_chunks(parent_id, head, &chunks)))
	}
}

fn cursor_after(item: &RankedMessage) -> SearchCursor {
	SearchCursor { id: item.message_id.clone(), score: item.final_score, ts: item.timestamp }
}

fn parent_from_chunks(parent_id: &str, head: StoredChunk, chunks: &[StoredChunk]) -> ParentContext {
	ParentContext {
		message_id: head.message_id.unwrap_or_else(|| parent_id.to_string()),
		user_id: head.user_id,
		content: parley_chunking::reconstruct(chunks),
		timestamp: head.timestamp,
	}
}

/// Index of the first item after the cursor.
///
/// The cursor's message is located by id; when it has dropped out of the window, everything that
/// would still rank at or above the cursor's score and timestamp is skipped instead.
fn resume_position(ranked: &[RankedMessage], cursor: &SearchCursor) -> usize {
	if let Some(idx) = ranked.iter().position(|item| item.message_id == cursor.id) {
		return idx + 1;
	}

	ranked
		.iter()
		.take_while(|item| {
			item.final_score > cursor.score
				|| (item.final_score == cursor.score && item.timestamp >= cursor.ts)
		})
		.count()
}
