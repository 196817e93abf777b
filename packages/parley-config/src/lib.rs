mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, Context, EmbeddingProviderConfig, Indexing, LlmProviderConfig, Postgres,
	Providers, Qdrant, RateLimit, Ranking, Search, Service, Storage, Synthesis,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	validate_storage(cfg)?;
	validate_providers(cfg)?;

	if cfg.chunking.target_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.target_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.min_chars > cfg.chunking.target_chars {
		return Err(Error::Validation {
			message: "chunking.min_chars must not exceed chunking.target_chars.".to_string(),
		});
	}
	if cfg.indexing.batch_size == 0 {
		return Err(Error::Validation {
			message: "indexing.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.indexing.max_concurrent_batches == 0 {
		return Err(Error::Validation {
			message: "indexing.max_concurrent_batches must be greater than zero.".to_string(),
		});
	}
	if cfg.indexing.resync_page_size == 0 {
		return Err(Error::Validation {
			message: "indexing.resync_page_size must be greater than zero.".to_string(),
		});
	}

	validate_ranking(&cfg.ranking)?;

	if cfg.search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_window < cfg.search.top_k {
		return Err(Error::Validation {
			message: "search.max_window must be at least search.top_k.".to_string(),
		});
	}

	for (label, value) in
		[("search.min_score", cfg.search.min_score), ("context.min_score", cfg.context.min_score)]
	{
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.context.max_tokens == 0 {
		return Err(Error::Validation {
			message: "context.max_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.context.top_k == 0 {
		return Err(Error::Validation {
			message: "context.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.synthesis.max_attempts == 0 {
		return Err(Error::Validation {
			message: "synthesis.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.rate_limit.bucket.trim().is_empty() {
		return Err(Error::Validation {
			message: "rate_limit.bucket must be non-empty.".to_string(),
		});
	}
	if cfg.rate_limit.quota == 0 {
		return Err(Error::Validation {
			message: "rate_limit.quota must be greater than zero.".to_string(),
		});
	}
	if cfg.rate_limit.window_secs == 0 {
		return Err(Error::Validation {
			message: "rate_limit.window_secs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_storage(cfg: &Config) -> Result<()> {
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_providers(cfg: &Config) -> Result<()> {
	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if embedding.max_input_chars == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.max_input_chars must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	for (label, value) in [
		("ranking.decay_per_hour", ranking.decay_per_hour),
		("ranking.thread_time_exponent", ranking.thread_time_exponent),
		("ranking.solo_time_exponent", ranking.solo_time_exponent),
		("ranking.tie_epsilon", ranking.tie_epsilon),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}
	for (label, value) in [
		("ranking.channel_boost", ranking.channel_boost),
		("ranking.thread_boost", ranking.thread_boost),
	] {
		if !value.is_finite() || value <= 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number greater than zero."),
			});
		}
	}

	if ranking.oversample_factor == 0 {
		return Err(Error::Validation {
			message: "ranking.oversample_factor must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}

	cfg.rate_limit.bucket = cfg.rate_limit.bucket.trim().to_string();
}
