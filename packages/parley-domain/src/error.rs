pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Message field {field} is required.")]
	MissingField { field: &'static str },
	#[error("Message {message_id} cannot reply to itself.")]
	SelfReply { message_id: String },
	#[error("Invalid cursor: {message}")]
	InvalidCursor { message: String },
}
