use anyhow::{bail, Result};
use clap::Parser;
use dipamkara::config::ServerConfig;
use dipamkara::engine::Dipamkara;
use dipamkara::protocol::ENGINE_NAME;
use dipamkara::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dipamkara")]
#[command(version)]
#[command(about = "Dipamkara vector database server")]
struct Cli {
    /// Path to the configuration file (.yaml)
    #[arg(value_name = "CONFIG_YAML")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;
    init_logging(config.verbose);

    if config.db_engine != ENGINE_NAME {
        bail!("db engine \"{}\" not supported", config.db_engine);
    }

    let engine = Dipamkara::open(config.dimension, &config.db_path, config.cached).await?;
    server::serve(&config, Arc::new(engine)).await
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "dipamkara=debug"
    } else {
        "dipamkara=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
