//! Retrieval and ranking engine for chat messages.
//!
//! [`ParleyService`] owns the write path (chunk, embed, upsert) and the read path (oversampled
//! retrieval, four-signal ranking, token-budgeted context windows, and rate-limited synthesis).
//! External systems are reached only through the traits in this module so tests can swap them.

pub mod context;
pub mod embedding;
pub mod index;
pub mod indexing;
pub mod rate_limit;
pub mod resync;
pub mod search;
pub mod synthesis;

mod error;

pub use context::{ContextRequest, ContextWindow, format_prompt};
pub use error::{Error, Result};
pub use indexing::BatchResult;
pub use resync::ResyncReport;
pub use search::{
	ParentContext, RankedMessage, SearchRequest, SearchResponse, SimilarityOptions,
};
pub use synthesis::{SynthesisRequest, SynthesisResponse};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use parley_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use parley_domain::{CandidateMatch, ChannelFilter, Message, StoredChunk, VectorRecord};
use parley_providers::generation::ChatMessage;
use parley_storage::{db::Db, qdrant::QdrantStore, rate_limit::PgRateLimitStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, parley_providers::Result<Vec<Vec<f32>>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, parley_providers::Result<String>>;
}

/// Approximate-nearest-neighbour store holding one record per chunk.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(&'a self, record: &'a VectorRecord) -> BoxFuture<'a, parley_storage::Result<()>>;

	fn upsert_batch<'a>(
		&'a self,
		records: &'a [VectorRecord],
	) -> BoxFuture<'a, parley_storage::Result<()>>;

	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
		filter: &'a ChannelFilter,
	) -> BoxFuture<'a, parley_storage::Result<Vec<CandidateMatch>>>;

	fn fetch_by_id<'a>(
		&'a self,
		record_id: &'a str,
	) -> BoxFuture<'a, parley_storage::Result<Option<StoredChunk>>>;

	fn clear_all(&self) -> BoxFuture<'_, parley_storage::Result<()>>;

	fn ensure_collection(&self) -> BoxFuture<'_, parley_storage::Result<()>>;
}

/// Shared fixed-window counter used by the synthesis rate limiter.
pub trait RateLimitStore
where
	Self: Send + Sync,
{
	/// Increments `key` and returns the count within the live window.
	fn increment<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> BoxFuture<'a, parley_storage::Result<u64>>;
}

/// Keyset-paginated read access to the message store.
pub trait MessageSource
where
	Self: Send + Sync,
{
	fn page<'a>(
		&'a self,
		after: Option<&'a str>,
		limit: u32,
	) -> BoxFuture<'a, parley_storage::Result<Vec<Message>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, generation }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider }
	}
}

pub struct ParleyService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub rate_limits: Arc<dyn RateLimitStore>,
}
impl ParleyService {
	/// Wires the HTTP providers, the Qdrant index, and the Postgres rate limiter.
	pub fn new(cfg: Config, qdrant: QdrantStore, db: &Db) -> Self {
		Self::with_parts(
			cfg,
			Arc::new(qdrant),
			Providers::default(),
			Arc::new(PgRateLimitStore::new(db.pool.clone())),
		)
	}

	pub fn with_parts(
		cfg: Config,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
		rate_limits: Arc<dyn RateLimitStore>,
	) -> Self {
		Self { cfg, index, providers, rate_limits }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, parley_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(parley_providers::embedding::embed(cfg, texts))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, parley_providers::Result<String>> {
		Box::pin(parley_providers::generation::generate(cfg, messages))
	}
}
