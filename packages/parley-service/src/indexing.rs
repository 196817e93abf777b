use futures::{StreamExt as _, TryStreamExt as _, stream};
use serde::{Deserialize, Serialize};

use parley_chunking::ChunkingConfig;
use parley_domain::{Chunk, Message, MessageMetadata, VectorRecord};

use crate::{Error, ParleyService, Result};

/// Per-message outcome of a bulk indexing call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
	pub message_id: String,
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl BatchResult {
	fn ok(message_id: &str) -> Self {
		Self { message_id: message_id.to_string(), success: true, error: None }
	}

	fn failed(message_id: &str, error: impl Into<String>) -> Self {
		Self { message_id: message_id.to_string(), success: false, error: Some(error.into()) }
	}
}

impl ParleyService {
	/// Chunks, embeds, and upserts one message. Returns the number of records written.
	///
	/// Re-indexing overwrites the same record ids, so the call is idempotent.
	pub async fn index_message(
		&self,
		message_id: &str,
		content: &str,
		metadata: MessageMetadata,
	) -> Result<usize> {
		let metadata = metadata.normalized();

		metadata.validate(message_id)?;

		let chunks = parley_chunking::chunk(content, message_id, &metadata, &self.chunking_config());

		if chunks.is_empty() {
			return Err(Error::validation(format!("Message {message_id} has no indexable content.")));
		}

		let records = self.embed_chunks(chunks).await?;

		self.index.upsert_batch(&records).await?;

		tracing::info!(message_id, chunks = records.len(), "Message indexed.");

		Ok(records.len())
	}

	/// Indexes many messages through shared, concurrently issued sub-batches.
	///
	/// Every message is validated before any network call and one invalid message rejects the
	/// whole call. Failure attribution is coarse: an error in any sub-batch marks every message
	/// that reached the embedding stage as failed with that error.
	pub async fn index_batch(&self, messages: &[Message]) -> Result<Vec<BatchResult>> {
		if messages.is_empty() {
			return Ok(Vec::new());
		}

		let mut metadata = Vec::with_capacity(messages.len());

		for message in messages {
			let meta = message.metadata().normalized();

			meta.validate(&message.id)?;
			metadata.push(meta);
		}

		let cfg = self.chunking_config();
		let mut empty = vec![false; messages.len()];
		let mut chunks = Vec::new();

		for (idx, (message, meta)) in messages.iter().zip(&metadata).enumerate() {
			let message_chunks = parley_chunking::chunk(&message.content, &message.id, meta, &cfg);

			if message_chunks.is_empty() {
				empty[idx] = true;

				continue;
			}

			chunks.extend(message_chunks);
		}

		let outcome = self.write_sub_batches(&chunks).await;

		if let Err(err) = &outcome {
			tracing::warn!(
				messages = messages.len(),
				chunks = chunks.len(),
				error = %err,
				"Batch indexing failed."
			);
		}

		let results = messages
			.iter()
			.zip(empty)
			.map(|(message, empty)| match (&outcome, empty) {
				(_, true) => BatchResult::failed(&message.id, "Message has no indexable content."),
				(Ok(()), false) => BatchResult::ok(&message.id),
				(Err(err), false) => BatchResult::failed(&message.id, err.to_string()),
			})
			.collect();

		Ok(results)
	}

	pub(crate) fn chunking_config(&self) -> ChunkingConfig {
		ChunkingConfig {
			target_chars: self.cfg.chunking.target_chars as usize,
			min_chars: self.cfg.chunking.min_chars as usize,
		}
	}

	async fn write_sub_batches(&self, chunks: &[Chunk]) -> Result<()> {
		let batch_size = self.cfg.indexing.batch_size.max(1) as usize;
		let max_concurrent = self.cfg.indexing.max_concurrent_batches.max(1) as usize;

		stream::iter(chunks.chunks(batch_size))
			.map(Ok::<_, Error>)
			.try_for_each_concurrent(max_concurrent, |batch| async move {
				let records = self.embed_chunks(batch.to_vec()).await?;

				self.index.upsert_batch(&records).await?;

				Ok(())
			})
			.await
	}

	async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<VectorRecord>> {
		let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
		let vectors = self.embed_batch(&texts).await?;

		Ok(chunks
			.into_iter()
			.zip(vectors)
			.map(|(chunk, vector)| VectorRecord::new(chunk, vector))
			.collect())
	}
}
