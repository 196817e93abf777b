use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

/// Position of the last item a client has seen in a ranked result list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchCursor {
	pub id: String,
	pub score: f32,
	#[serde(with = "time::serde::rfc3339")]
	pub ts: OffsetDateTime,
}
impl SearchCursor {
	pub fn encode(&self) -> Result<String> {
		let json = serde_json::to_vec(self)
			.map_err(|err| Error::InvalidCursor { message: err.to_string() })?;

		Ok(URL_SAFE_NO_PAD.encode(json))
	}

	pub fn decode(raw: &str) -> Result<Self> {
		let bytes = URL_SAFE_NO_PAD
			.decode(raw.trim())
			.map_err(|err| Error::InvalidCursor { message: err.to_string() })?;
		let cursor: Self = serde_json::from_slice(&bytes)
			.map_err(|err| Error::InvalidCursor { message: err.to_string() })?;

		if !cursor.score.is_finite() {
			return Err(Error::InvalidCursor { message: "Cursor score is not finite.".to_string() });
		}

		Ok(cursor)
	}
}
