use anyhow::Result;
use clap::Parser;
use etfscout::{Config, Database};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = Config::load()?;

    // Initialize tracing with structured JSON logging on stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "etfscout starting up");

    // One storage owner for the whole process
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    db.health_check().await?;

    info!("Database initialized successfully");

    let command = cli.command.unwrap_or(Commands::Interactive);
    let result = cli::run(command, &config, &db).await;

    db.close().await;

    result?;
    info!("etfscout completed successfully");
    Ok(())
}
