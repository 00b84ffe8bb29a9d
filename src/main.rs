//! Vapord bot entry point.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vapord::config::Settings;
use vapord::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "vapord", about = "Vaporwave Telegram bot", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // The bot token (TELOXIDE_TOKEN) comes from the environment, optionally
    // via a local .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vapord={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = Settings::load_from(cli.config.as_ref())?;

    // Ensure the cache working directory exists
    std::fs::create_dir_all(settings.cache_dir())?;

    let orchestrator = Arc::new(Orchestrator::new(&settings)?);

    info!("Bot ready. Cache directory: {:?}", settings.cache_dir());
    vapord::bot::run(settings, orchestrator).await;

    Ok(())
}
