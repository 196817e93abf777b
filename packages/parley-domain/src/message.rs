use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

/// Read-only projection of a chat message as stored by the relational store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
	pub id: String,
	pub channel_id: String,
	pub user_id: String,
	pub content: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply_to_id: Option<String>,
}
impl Message {
	pub fn metadata(&self) -> MessageMetadata {
		MessageMetadata {
			channel_id: self.channel_id.clone(),
			user_id: self.user_id.clone(),
			created_at: self.created_at,
			reply_to_id: self.reply_to_id.clone(),
		}
	}
}

/// Closed metadata schema carried by every chunk of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
	pub channel_id: String,
	pub user_id: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply_to_id: Option<String>,
}
impl MessageMetadata {
	/// Checks the required fields for a message about to be indexed.
	///
	/// A blank `reply_to_id` is treated as absent by [`MessageMetadata::normalized`], so callers
	/// should normalize first.
	pub fn validate(&self, message_id: &str) -> Result<()> {
		if message_id.trim().is_empty() {
			return Err(Error::MissingField { field: "id" });
		}
		if self.channel_id.trim().is_empty() {
			return Err(Error::MissingField { field: "channel_id" });
		}
		if self.user_id.trim().is_empty() {
			return Err(Error::MissingField { field: "user_id" });
		}
		if self.reply_to_id.as_deref() == Some(message_id) {
			return Err(Error::SelfReply { message_id: message_id.to_string() });
		}

		Ok(())
	}

	pub fn normalized(mut self) -> Self {
		if self.reply_to_id.as_deref().map(|id| id.trim().is_empty()).unwrap_or(false) {
			self.reply_to_id = None;
		}

		self
	}
}
