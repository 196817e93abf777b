//! Shared data model for the message retrieval engine.

pub mod chunk;
pub mod cursor;
pub mod filter;
pub mod message;
pub mod tokens;

mod error;

pub use chunk::{CandidateMatch, Chunk, IndexedText, StoredChunk, VectorRecord, record_id};
pub use cursor::SearchCursor;
pub use error::{Error, Result};
pub use filter::ChannelFilter;
pub use message::{Message, MessageMetadata};
pub use tokens::estimate_tokens;
