pub mod db;
pub mod messages;
pub mod qdrant;
pub mod rate_limit;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
