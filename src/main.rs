//! `jsonhttp` binary: an echo and health server built on the library.

use std::path::PathBuf;

use clap::Parser;

use jsonhttp::config::{load_config, ServerConfig};
use jsonhttp::http::handlers;
use jsonhttp::observability::{init_logging, init_metrics};
use jsonhttp::Server;

#[derive(Debug, Parser)]
#[command(name = "jsonhttp", version, about = "JSON-over-HTTP echo server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `dispatch.max_tries`.
    #[arg(long)]
    max_tries: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(max_tries) = cli.max_tries {
        config.dispatch.max_tries = max_tries;
    }

    let _guard = init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_tries = config.dispatch.max_tries,
        "jsonhttp starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    Server::new(config)?
        .handle("/echo", handlers::echo)
        .handle_get("/health", handlers::health)
        .listen()
        .await?;

    Ok(())
}
