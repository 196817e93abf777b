//! Vector index backed by a single Qdrant collection.
//!
//! Qdrant only accepts unsigned integers or UUIDs as point ids, so each record id
//! (`{message_id}_chunk_{n}`) maps to a UUIDv5 and the record id itself rides in the payload.

use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
		Filter, GetPointsBuilder, PointId, PointStruct, Query, QueryPointsBuilder, UpsertPointsBuilder,
		Value, VectorParamsBuilder, point_id::PointIdOptions, value::Kind,
	},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use parley_domain::{CandidateMatch, ChannelFilter, StoredChunk, VectorRecord};

use crate::{Error, Result};

const KEYWORD_FIELDS: [&str; 3] = ["channel_id", "message_id", "reply_to_id"];

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &parley_config::Qdrant) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(api_key) = cfg.api_key.as_ref() {
			builder = builder.api_key(api_key.clone());
		}

		let client = builder.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn upsert(&self, record: &VectorRecord) -> Result<()> {
		self.upsert_batch(std::slice::from_ref(record)).await
	}

	/// Writes all records in one request; an empty slice is a no-op.
	pub async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(records.len());

		for record in records {
			if record.embedding.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Record {} has {} dimensions; collection expects {}.",
					record.id,
					record.embedding.len(),
					self.vector_dim
				)));
			}

			points.push(PointStruct::new(
				point_uuid(&record.id).to_string(),
				record.embedding.clone(),
				Payload::from(record_payload(record)?),
			));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	/// Nearest-neighbour query by cosine similarity, most similar first.
	///
	/// Points with an unreadable payload are skipped with a warning.
	pub async fn query(
		&self,
		vector: &[f32],
		top_k: u32,
		filter: &ChannelFilter,
	) -> Result<Vec<CandidateMatch>> {
		if top_k == 0 {
			return Ok(Vec::new());
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(u64::from(top_k))
			.with_payload(true);

		if let Some(filter) = channel_filter(filter) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;
		let mut out = Vec::with_capacity(response.result.len());

		for point in response.result {
			let record_id = payload_string(&point.payload, "record_id")
				.or_else(|| point.id.as_ref().and_then(point_id_to_string));
			let Some(record_id) = record_id else {
				tracing::warn!("Vector candidate missing record_id.");

				continue;
			};

			match stored_chunk_from_payload(&point.payload) {
				Some(metadata) =>
					out.push(CandidateMatch { record_id, raw_score: point.score, metadata }),
				None => {
					tracing::warn!(record_id = %record_id, "Vector candidate has malformed payload.");
				},
			}
		}

		Ok(out)
	}

	/// Point lookup by record id. The stored vector is not returned.
	pub async fn fetch_by_id(&self, record_id: &str) -> Result<Option<StoredChunk>> {
		let request = GetPointsBuilder::new(
			self.collection.clone(),
			vec![PointId::from(point_uuid(record_id).to_string())],
		)
		.with_payload(true);
		let response = self.client.get_points(request).await?;
		let Some(point) = response.result.into_iter().next() else {
			return Ok(None);
		};
		let chunk = stored_chunk_from_payload(&point.payload).ok_or_else(|| {
			Error::MalformedRecord {
				record_id: record_id.to_string(),
				message: "Payload is missing required chunk fields.".to_string(),
			}
		})?;

		Ok(Some(chunk))
	}

	/// Drops every record by deleting and recreating the collection.
	pub async fn clear_all(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			self.client.delete_collection(self.collection.clone()).await?;

			tracing::info!(collection = %self.collection, "Vector collection deleted.");
		}

		self.ensure_collection().await
	}

	/// Creates the collection and its keyword payload indexes when missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
					VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
				),
			)
			.await?;

		for field in KEYWORD_FIELDS {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(
						self.collection.clone(),
						field,
						FieldType::Keyword,
					)
					.wait(true),
				)
				.await?;
		}

		tracing::info!(
			collection = %self.collection,
			vector_dim = self.vector_dim,
			"Vector collection created."
		);

		Ok(())
	}
}

pub fn point_uuid(record_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}

pub fn channel_filter(filter: &ChannelFilter) -> Option<Filter> {
	match filter {
		ChannelFilter::Any => None,
		ChannelFilter::Equals(channel_id) =>
			Some(Filter::must([Condition::matches("channel_id", channel_id.clone())])),
		ChannelFilter::In(channel_ids) =>
			Some(Filter::must([Condition::matches("channel_id", channel_ids.clone())])),
	}
}

fn record_payload(record: &VectorRecord) -> Result<HashMap<String, Value>> {
	let chunk = &record.chunk;
	let timestamp = chunk
		.timestamp
		.format(&Rfc3339)
		.map_err(|err| Error::InvalidArgument(format!("Unformattable timestamp: {err}.")))?;
	let mut payload = HashMap::new();

	payload.insert("record_id".to_string(), Value::from(record.id.clone()));
	payload.insert("message_id".to_string(), Value::from(chunk.message_id.clone()));
	payload.insert("chunk_index".to_string(), Value::from(i64::from(chunk.chunk_index)));
	payload.insert("total_chunks".to_string(), Value::from(i64::from(chunk.total_chunks)));
	payload.insert("channel_id".to_string(), Value::from(chunk.channel_id.clone()));
	payload.insert("user_id".to_string(), Value::from(chunk.user_id.clone()));
	payload.insert("timestamp".to_string(), Value::from(timestamp));
	payload.insert("content".to_string(), Value::from(chunk.content.clone()));

	if let Some(reply_to_id) = chunk.reply_to_id.as_ref() {
		payload.insert("reply_to_id".to_string(), Value::from(reply_to_id.clone()));
	}

	Ok(payload)
}

fn stored_chunk_from_payload(payload: &HashMap<String, Value>) -> Option<StoredChunk> {
	Some(StoredChunk {
		message_id: payload_string(payload, "message_id"),
		chunk_index: payload_u32(payload, "chunk_index").unwrap_or(0),
		total_chunks: payload_u32(payload, "total_chunks").unwrap_or(1),
		channel_id: payload_string(payload, "channel_id")?,
		user_id: payload_string(payload, "user_id")?,
		timestamp: payload_rfc3339(payload, "timestamp")?,
		reply_to_id: payload_string(payload, "reply_to_id").filter(|id| !id.is_empty()),
		content: payload_string(payload, "content").unwrap_or_default(),
	})
}

fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_rfc3339(payload: &HashMap<String, Value>, key: &str) -> Option<OffsetDateTime> {
	let text = payload_string(payload, key)?;

	OffsetDateTime::parse(text.as_str(), &Rfc3339).ok()
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}
