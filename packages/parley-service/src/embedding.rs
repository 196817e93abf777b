use futures::future;

use crate::{Error, ParleyService, Result};

impl ParleyService {
	pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed_batch(&[text.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::provider_response("Embedding provider returned no vector."))
	}

	/// Embeds `texts` in input order.
	///
	/// Blank inputs are rejected before any provider call. Inputs over
	/// `providers.embedding.max_input_chars` are truncated. Providers without batch support get one
	/// concurrent call per text.
	pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}
		if texts.iter().any(|text| text.trim().is_empty()) {
			return Err(Error::validation("Embedding input must be non-empty."));
		}

		let cfg = &self.cfg.providers.embedding;
		let inputs: Vec<String> = texts
			.iter()
			.map(|text| truncate_chars(text, cfg.max_input_chars as usize).to_string())
			.collect();
		let vectors = if cfg.supports_batch {
			self.providers.embedding.embed(cfg, &inputs).await?
		} else {
			let calls = inputs.chunks(1).map(|input| self.providers.embedding.embed(cfg, input));
			let per_text = future::try_join_all(calls).await?;
			let mut vectors = Vec::with_capacity(per_text.len());

			for mut batch in per_text {
				if batch.len() != 1 {
					return Err(Error::provider_response(format!(
						"Embedding provider returned {} vectors for one input.",
						batch.len()
					)));
				}

				vectors.append(&mut batch);
			}

			vectors
		};

		if vectors.len() != inputs.len() {
			return Err(Error::provider_response(format!(
				"Embedding provider returned {} vectors for {} inputs.",
				vectors.len(),
				inputs.len()
			)));
		}

		let expected_dim = self.cfg.storage.qdrant.vector_dim as usize;

		if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected_dim) {
			return Err(Error::provider_response(format!(
				"Embedding vector dimension mismatch: expected {expected_dim}, got {}.",
				vector.len()
			)));
		}

		Ok(vectors)
	}
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => &text[..byte_idx],
		None => text,
	}
}
