mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediagrab::config::Config;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "mediagrab=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = Config::load_with(args.config)?;
            mediagrab::api::run(config, args.address).await?
        }
    }

    Ok(())
}
