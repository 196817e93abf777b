pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	Validation { message: String },
	#[error(transparent)]
	Provider(#[from] parley_providers::Error),
	#[error(transparent)]
	Storage(#[from] parley_storage::Error),
	#[error("Rate limit exceeded for bucket {bucket}: {quota} requests per {window_secs}s.")]
	RateLimitExceeded { bucket: String, quota: u32, window_secs: u64 },
	#[error("Generation failed after {attempts} attempts: {message}")]
	SynthesisExhausted { attempts: u32, message: String },
}
impl Error {
	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}

	pub(crate) fn provider_response(message: impl Into<String>) -> Self {
		Self::Provider(parley_providers::Error::InvalidResponse { message: message.into() })
	}
}

impl From<parley_domain::Error> for Error {
	fn from(err: parley_domain::Error) -> Self {
		Self::Validation { message: err.to_string() }
	}
}
