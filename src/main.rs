use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chess_session::app;
use chess_session::config::{AppConfig, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the adapter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chess_session=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::resolve(&cli)?;
    app::run(config)
}
