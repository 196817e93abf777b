use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = parley_ctl::Args::parse();

	parley_ctl::run(args).await
}
