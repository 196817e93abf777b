use parley_domain::{CandidateMatch, ChannelFilter, StoredChunk, VectorRecord};
use parley_storage::qdrant::QdrantStore;

use crate::{BoxFuture, ParleyService, Result, VectorIndex};

impl VectorIndex for QdrantStore {
	fn upsert<'a>(&'a self, record: &'a VectorRecord) -> BoxFuture<'a, parley_storage::Result<()>> {
		Box::pin(QdrantStore::upsert(self, record))
	}

	fn upsert_batch<'a>(
		&'a self,
		records: &'a [VectorRecord],
	) -> BoxFuture<'a, parley_storage::Result<()>> {
		Box::pin(QdrantStore::upsert_batch(self, records))
	}

	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
		filter: &'a ChannelFilter,
	) -> BoxFuture<'a, parley_storage::Result<Vec<CandidateMatch>>> {
		Box::pin(QdrantStore::query(self, vector, top_k, filter))
	}

	fn fetch_by_id<'a>(
		&'a self,
		record_id: &'a str,
	) -> BoxFuture<'a, parley_storage::Result<Option<StoredChunk>>> {
		Box::pin(QdrantStore::fetch_by_id(self, record_id))
	}

	fn clear_all(&self) -> BoxFuture<'_, parley_storage::Result<()>> {
		Box::pin(QdrantStore::clear_all(self))
	}

	fn ensure_collection(&self) -> BoxFuture<'_, parley_storage::Result<()>> {
		Box::pin(QdrantStore::ensure_collection(self))
	}
}

impl ParleyService {
	/// Removes every vector record. Re-sync rebuilds the index from the message store.
	pub async fn clear_index(&self) -> Result<()> {
		self.index.clear_all().await?;

		tracing::info!("Vector index cleared.");

		Ok(())
	}

	pub async fn ensure_index(&self) -> Result<()> {
		self.index.ensure_collection().await?;

		Ok(())
	}
}
