/// Channel scoping applied to a similarity query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ChannelFilter {
	#[default]
	Any,
	Equals(String),
	In(Vec<String>),
}
impl ChannelFilter {
	/// A single `channel_id` wins over `channel_ids`; an empty list means unscoped.
	pub fn from_scope(channel_id: Option<&str>, channel_ids: Option<&[String]>) -> Self {
		if let Some(channel_id) = channel_id.map(str::trim).filter(|id| !id.is_empty()) {
			return Self::Equals(channel_id.to_string());
		}

		match channel_ids {
			Some(ids) if !ids.is_empty() => Self::In(ids.to_vec()),
			_ => Self::Any,
		}
	}

	/// Channel eligible for the channel boost; only a single-channel scope has one.
	pub fn boosted_channel(&self) -> Option<&str> {
		match self {
			Self::Equals(channel_id) => Some(channel_id.as_str()),
			Self::Any | Self::In(_) => None,
		}
	}

	pub fn matches(&self, channel_id: &str) -> bool {
		match self {
			Self::Any => true,
			Self::Equals(expected) => expected == channel_id,
			Self::In(allowed) => allowed.iter().any(|allowed| allowed == channel_id),
		}
	}
}
