use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Deterministic vector record id for one chunk of a message.
pub fn record_id(message_id: &str, chunk_index: u32) -> String {
	format!("{message_id}_chunk_{chunk_index}")
}

/// Anything that carries a chunk position and its text.
pub trait IndexedText {
	fn chunk_index(&self) -> u32;

	fn text(&self) -> &str;
}

/// Bounded slice of a message, the unit that gets embedded and stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub content: String,
	pub message_id: String,
	pub chunk_index: u32,
	pub total_chunks: u32,
	pub channel_id: String,
	pub user_id: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply_to_id: Option<String>,
}
impl Chunk {
	pub fn record_id(&self) -> String {
		record_id(&self.message_id, self.chunk_index)
	}
}
impl IndexedText for Chunk {
	fn chunk_index(&self) -> u32 {
		self.chunk_index
	}

	fn text(&self) -> &str {
		&self.content
	}
}

#[derive(Clone, Debug)]
pub struct VectorRecord {
	pub id: String,
	pub embedding: Vec<f32>,
	pub chunk: Chunk,
}
impl VectorRecord {
	pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
		Self { id: chunk.record_id(), embedding, chunk }
	}
}

/// Chunk payload as read back from the vector index.
///
/// `message_id` stays optional: records written by older pipelines may lack it, and retrieval
/// falls back to the record id in that case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
	pub message_id: Option<String>,
	pub chunk_index: u32,
	pub total_chunks: u32,
	pub channel_id: String,
	pub user_id: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply_to_id: Option<String>,
	pub content: String,
}
impl From<Chunk> for StoredChunk {
	fn from(chunk: Chunk) -> Self {
		Self {
			message_id: Some(chunk.message_id),
			chunk_index: chunk.chunk_index,
			total_chunks: chunk.total_chunks,
			channel_id: chunk.channel_id,
			user_id: chunk.user_id,
			timestamp: chunk.timestamp,
			reply_to_id: chunk.reply_to_id,
			content: chunk.content,
		}
	}
}
impl IndexedText for StoredChunk {
	fn chunk_index(&self) -> u32 {
		self.chunk_index
	}

	fn text(&self) -> &str {
		&self.content
	}
}

/// One scored hit from a similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateMatch {
	pub record_id: String,
	pub raw_score: f32,
	pub metadata: StoredChunk,
}
impl CandidateMatch {
	/// Logical message this chunk belongs to.
	pub fn message_key(&self) -> &str {
		self.metadata.message_id.as_deref().unwrap_or(self.record_id.as_str())
	}
}
impl IndexedText for CandidateMatch {
	fn chunk_index(&self) -> u32 {
		self.metadata.chunk_index
	}

	fn text(&self) -> &str {
		&self.metadata.content
	}
}
