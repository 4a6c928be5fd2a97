use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sag_api::Args::parse();

	sag_api::run(args).await
}
