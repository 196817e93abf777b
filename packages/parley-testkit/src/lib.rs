//! Scratch Postgres databases and Qdrant collections for the storage integration tests.
//!
//! Tests opt in through `PARLEY_PG_DSN` and `PARLEY_QDRANT_URL`. The DSN must point at a
//! maintenance database the test role may `CREATE DATABASE` from.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

/// Schema of the chat backend's message table, as far as the resync reader relies on it.
pub const MESSAGES_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS messages (
	id text PRIMARY KEY,
	channel_id text NOT NULL,
	user_id text NOT NULL,
	content text NOT NULL,
	created_at timestamptz NOT NULL,
	reply_to_id text NULL
)";

/// A uniquely named database plus every collection named after it.
///
/// Nothing is removed on drop; call [`TestDatabase::cleanup`] at the end of the test.
pub struct TestDatabase {
	database: String,
	dsn: String,
	maintenance: PgConnectOptions,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let maintenance = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Invalid PARLEY_PG_DSN: {err}.")))?;
		let database = format!("parley_test_{}", Uuid::new_v4().simple());
		let mut conn = PgConnection::connect_with(&maintenance).await?;

		conn.execute(format!(r#"CREATE DATABASE "{database}""#).as_str()).await?;
		conn.close().await?;

		let dsn = maintenance.clone().database(&database).to_url_lossy().to_string();

		Ok(Self { database, dsn, maintenance })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Collection name that [`TestDatabase::cleanup`] will delete.
	pub fn collection_name(&self, prefix: &str) -> String {
		scoped_collection(prefix, &self.database)
	}

	/// Drops the database and any collection handed out by [`TestDatabase::collection_name`].
	pub async fn cleanup(self) -> Result<()> {
		let collections = drop_collections(&self.database).await;
		let mut conn = PgConnection::connect_with(&self.maintenance).await?;

		// FORCE disconnects pools the test forgot to close.
		let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, self.database);

		conn.execute(drop_sql.as_str()).await?;
		conn.close().await?;

		collections
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("PARLEY_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PARLEY_QDRANT_URL").ok()
}

fn scoped_collection(prefix: &str, database: &str) -> String {
	format!("{prefix}__{database}")
}

fn owned_by(collection: &str, database: &str) -> bool {
	collection.strip_suffix(database).is_some_and(|head| head.ends_with("__"))
}

async fn drop_collections(database: &str) -> Result<()> {
	let Some(url) = env_qdrant_url() else {
		return Ok(());
	};
	let client = Qdrant::from_url(&url).build()?;
	let listed = client.list_collections().await?;

	for collection in listed.collections {
		if owned_by(&collection.name, database) {
			client.delete_collection(collection.name).await?;
		}
	}

	Ok(())
}
