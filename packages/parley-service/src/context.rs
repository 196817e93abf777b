use std::{collections::BTreeSet, fmt::Write as _};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use parley_domain::{ChannelFilter, estimate_tokens};
use parley_providers::generation::ChatMessage;

use crate::{
	ParleyService,
	search::{RankedMessage, RetrievalScope},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextRequest {
	pub channel_id: String,
	pub prompt: String,
	pub max_tokens: Option<u32>,
	/// Search every channel instead of only `channel_id`. An unscoped search boosts no channel.
	#[serde(default)]
	pub include_related_channels: bool,
	pub min_score: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
	pub messages: Vec<RankedMessage>,
	pub total_tokens: u32,
	pub touched_channels: BTreeSet<String>,
}

impl ParleyService {
	/// Builds a token-budgeted window of ranked messages for `req.prompt`.
	///
	/// Never fails: retrieval errors are logged and produce an empty window.
	pub async fn get_context_window(&self, req: &ContextRequest) -> ContextWindow {
		self.get_context_window_at(req, OffsetDateTime::now_utc()).await
	}

	pub async fn get_context_window_at(
		&self,
		req: &ContextRequest,
		now: OffsetDateTime,
	) -> ContextWindow {
		let max_tokens = req.max_tokens.unwrap_or(self.cfg.context.max_tokens);
		let min_score = req.min_score.unwrap_or(self.cfg.context.min_score);
		let filter = if req.include_related_channels {
			ChannelFilter::Any
		} else {
			ChannelFilter::Equals(req.channel_id.clone())
		};
		let scope = RetrievalScope::from_filter(filter);
		let top_k = self.cfg.context.top_k;
		let mut ranked =
			match self.ranked_candidates(&req.prompt, &scope, top_k, min_score, now).await {
				Ok(ranked) => ranked,
				Err(err) => {
					tracing::error!(
						channel_id = %req.channel_id,
						error = %err,
						"Context retrieval failed."
					);

					return ContextWindow::default();
				},
			};

		ranked.truncate(top_k as usize);

		self.attach_parent_context(&mut ranked).await;

		select_within_budget(ranked, max_tokens)
	}
}

/// Estimated prompt cost of one result, including its parent context.
pub fn message_tokens(message: &RankedMessage) -> u32 {
	let parent = message.parent_context.as_ref().map(|parent| estimate_tokens(&parent.content));

	estimate_tokens(&message.content).saturating_add(parent.unwrap_or(0))
}

/// Takes results in rank order until the next one would overflow `max_tokens`.
pub fn select_within_budget(ranked: Vec<RankedMessage>, max_tokens: u32) -> ContextWindow {
	let mut window = ContextWindow::default();

	for message in ranked {
		let cost = message_tokens(&message);

		if window.total_tokens.saturating_add(cost) > max_tokens {
			break;
		}

		window.total_tokens += cost;
		window.touched_channels.insert(message.channel_id.clone());
		window.messages.push(message);

		if window.total_tokens == max_tokens {
			break;
		}
	}

	window
}

/// Renders the window as numbered context blocks followed by the user's prompt.
pub fn format_prompt(
	window: &ContextWindow,
	prompt: &str,
	system_prompt: &str,
) -> Vec<ChatMessage> {
	let mut body = String::new();

	if window.messages.is_empty() {
		body.push_str("No related messages were found.\n\n");
	} else {
		body.push_str("Context messages:\n\n");
	}

	for (idx, message) in window.messages.iter().enumerate() {
		let _ = writeln!(
			body,
			"[{}] {} in #{} at {}",
			idx + 1,
			message.user_id,
			message.channel_id,
			rfc3339(message.timestamp)
		);

		if let Some(parent) = message.parent_context.as_ref() {
			let _ = writeln!(
				body,
				"  (in reply to {} at {}: {})",
				parent.user_id,
				rfc3339(parent.timestamp),
				parent.content.trim()
			);
		}

		let _ = writeln!(body, "{}\n", message.content.trim());
	}

	let _ = write!(body, "Question: {}", prompt.trim());

	vec![ChatMessage::system(system_prompt), ChatMessage::user(body)]
}

fn rfc3339(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}
