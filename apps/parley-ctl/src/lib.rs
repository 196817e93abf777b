use std::{path::PathBuf, time::Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use parley_config::Config;
use parley_service::{
	ContextRequest, MessageSource, ParleyService, SearchRequest, SynthesisRequest,
};
use parley_storage::{db::Db, messages::PgMessageSource, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = parley_cli::VERSION,
	rename_all = "kebab",
	styles = parley_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab")]
pub enum Command {
	/// Create the vector collection, its payload indexes, and the service tables.
	EnsureIndex,
	/// Drop every vector record and recreate an empty collection.
	ClearIndex,
	/// Re-index all messages from the message store.
	Resync {
		#[arg(long, value_name = "N")]
		page_size: Option<u32>,
	},
	/// Ranked similarity search, one page at a time.
	Search {
		query: String,
		#[arg(long, value_name = "ID")]
		channel: Option<String>,
		#[arg(long, value_name = "N")]
		top_k: Option<u32>,
		#[arg(long, value_name = "SCORE")]
		min_score: Option<f32>,
		#[arg(long, value_name = "CURSOR")]
		cursor: Option<String>,
	},
	/// Token-budgeted context window for a prompt in a channel.
	Context {
		channel: String,
		prompt: String,
		#[arg(long, value_name = "N")]
		max_tokens: Option<u32>,
		#[arg(long)]
		related: bool,
	},
	/// Answer a prompt from channel context with the configured model.
	Synthesize {
		channel: String,
		prompt: String,
		#[arg(long)]
		related: bool,
	},
}

impl Command {
	/// Subcommand name as typed on the command line.
	pub fn name(&self) -> &'static str {
		match self {
			Self::EnsureIndex => "ensure-index",
			Self::ClearIndex => "clear-index",
			Self::Resync { .. } => "resync",
			Self::Search { .. } => "search",
			Self::Context { .. } => "context",
			Self::Synthesize { .. } => "synthesize",
		}
	}
}

#[derive(Debug, Serialize)]
struct IndexStatus<'a> {
	collection: &'a str,
	action: &'static str,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = parley_config::load(&args.config)?;

	init_tracing(&config);

	let db = Db::connect(&config.storage.postgres).await?;
	let qdrant = QdrantStore::new(&config.storage.qdrant)?;
	let source = PgMessageSource::new(db.pool.clone());
	let service = ParleyService::new(config, qdrant, &db);

	if matches!(args.command, Command::EnsureIndex) {
		db.ensure_schema().await?;
	}

	let command = args.command.name();
	let started = Instant::now();
	let output = execute(&service, &source, args.command).await?;

	tracing::info!(
		command,
		elapsed_ms = started.elapsed().as_millis() as u64,
		"Command finished."
	);

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

/// Runs one subcommand against a wired service and returns its JSON report.
pub async fn execute(
	service: &ParleyService,
	source: &dyn MessageSource,
	command: Command,
) -> color_eyre::Result<Value> {
	let collection = service.cfg.storage.qdrant.collection.as_str();
	let output = match command {
		Command::EnsureIndex => {
			service.ensure_index().await?;

			serde_json::to_value(IndexStatus { collection, action: "ensured" })?
		},
		Command::ClearIndex => {
			service.clear_index().await?;

			serde_json::to_value(IndexStatus { collection, action: "cleared" })?
		},
		Command::Resync { page_size } => {
			let page_size = page_size.unwrap_or(service.cfg.indexing.resync_page_size);

			serde_json::to_value(service.resync(source, page_size).await?)?
		},
		Command::Search { query, channel, top_k, min_score, cursor } => {
			let req = SearchRequest {
				query,
				channel_id: channel,
				channel_ids: None,
				top_k,
				min_score,
				cursor,
			};

			serde_json::to_value(service.search(&req).await?)?
		},
		Command::Context { channel, prompt, max_tokens, related } => {
			let req = ContextRequest {
				channel_id: channel,
				prompt,
				max_tokens,
				include_related_channels: related,
				min_score: None,
			};

			serde_json::to_value(service.get_context_window(&req).await)?
		},
		Command::Synthesize { channel, prompt, related } => {
			let req =
				SynthesisRequest { channel_id: channel, prompt, include_related_channels: related };

			serde_json::to_value(service.synthesize(&req).await?)?
		},
	};

	Ok(output)
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	// stdout carries the JSON report.
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
