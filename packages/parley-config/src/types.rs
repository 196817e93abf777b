use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub indexing: Indexing,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub synthesis: Synthesis,
	#[serde(default)]
	pub rate_limit: RateLimit,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	/// Inputs longer than this many characters are truncated before the provider call.
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: u32,
	/// When false, batch embedding fans out one provider call per text.
	#[serde(default = "default_true")]
	pub supports_batch: bool,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chunking {
	pub target_chars: u32,
	pub min_chars: u32,
}
impl Default for Chunking {
	fn default() -> Self {
		Self { target_chars: 512, min_chars: 100 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Indexing {
	/// Records per embed/upsert round trip in bulk indexing.
	pub batch_size: u32,
	pub max_concurrent_batches: u32,
	pub resync_page_size: u32,
}
impl Default for Indexing {
	fn default() -> Self {
		Self { batch_size: 100, max_concurrent_batches: 4, resync_page_size: 500 }
	}
}

/// Scoring weights for the four-signal relevance model.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub decay_per_hour: f32,
	pub channel_boost: f32,
	pub thread_boost: f32,
	pub thread_time_exponent: f32,
	pub solo_time_exponent: f32,
	pub oversample_factor: u32,
	pub tie_epsilon: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			decay_per_hour: 0.5,
			channel_boost: 1.2,
			thread_boost: 1.5,
			thread_time_exponent: 3.0,
			solo_time_exponent: 2.0,
			oversample_factor: 3,
			tie_epsilon: 0.01,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub top_k: u32,
	pub min_score: f32,
	/// Upper bound on ranked results a cursor can page through.
	pub max_window: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { top_k: 5, min_score: 0.6, max_window: 50 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Context {
	pub max_tokens: u32,
	pub min_score: f32,
	pub top_k: u32,
}
impl Default for Context {
	fn default() -> Self {
		Self { max_tokens: 4_000, min_score: 0.7, top_k: 5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub system_prompt: String,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay_ms: 1_000,
			system_prompt: default_system_prompt(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimit {
	pub bucket: String,
	pub quota: u32,
	pub window_secs: u64,
}
impl Default for RateLimit {
	fn default() -> Self {
		Self { bucket: "synthesis".to_string(), quota: 30, window_secs: 60 }
	}
}

fn default_max_input_chars() -> u32 {
	8_000
}

fn default_true() -> bool {
	true
}

fn default_system_prompt() -> String {
	"You answer questions about a chat workspace. Use only the numbered context messages. \
	 If the context does not contain the answer, say so."
		.to_string()
}
