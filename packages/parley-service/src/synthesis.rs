use std::time::Duration;

use serde::{Deserialize, Serialize};

use parley_providers::generation::ChatMessage;

use crate::{ContextRequest, Error, ParleyService, Result, context};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SynthesisRequest {
	pub channel_id: String,
	pub prompt: String,
	#[serde(default)]
	pub include_related_channels: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResponse {
	pub response: String,
	pub context_message_count: usize,
}

impl ParleyService {
	/// Answers `req.prompt` from the channel's context window.
	///
	/// The rate limiter runs before any retrieval or provider work. Generation failures are
	/// retried with exponential backoff up to `synthesis.max_attempts` in total.
	pub async fn synthesize(&self, req: &SynthesisRequest) -> Result<SynthesisResponse> {
		if req.prompt.trim().is_empty() {
			return Err(Error::validation("Prompt must be non-empty."));
		}
		if req.channel_id.trim().is_empty() {
			return Err(Error::validation("channel_id must be non-empty."));
		}

		self.check_rate_limit().await?;

		let window = self
			.get_context_window(&ContextRequest {
				channel_id: req.channel_id.clone(),
				prompt: req.prompt.clone(),
				max_tokens: None,
				include_related_channels: req.include_related_channels,
				min_score: None,
			})
			.await;
		let messages =
			context::format_prompt(&window, &req.prompt, &self.cfg.synthesis.system_prompt);
		let response = self.generate_with_retry(&messages).await?;

		Ok(SynthesisResponse { response, context_message_count: window.messages.len() })
	}

	async fn generate_with_retry(&self, messages: &[ChatMessage]) -> Result<String> {
		let cfg = &self.cfg.synthesis;
		let max_attempts = cfg.max_attempts.max(1);
		let mut last_error = String::new();

		for attempt in 1..=max_attempts {
			match self.providers.generation.generate(&self.cfg.providers.llm, messages).await {
				Ok(text) => return Ok(text),
				Err(err) => {
					tracing::warn!(attempt, max_attempts, error = %err, "Generation attempt failed.");

					last_error = err.to_string();
				},
			}

			if attempt < max_attempts {
				tokio::time::sleep(retry_delay(attempt, cfg.base_delay_ms)).await;
			}
		}

		Err(Error::SynthesisExhausted { attempts: max_attempts, message: last_error })
	}
}

/// Backoff before the retry that follows failed attempt `attempt` (1-based): `2^attempt * base`.
pub fn retry_delay(attempt: u32, base_delay_ms: u64) -> Duration {
	let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);

	Duration::from_millis(base_delay_ms.saturating_mul(factor))
}
