//! Glucose API Server
//!
//! Run with: cargo run --bin glucose-api
//!
//! # Configuration
//!
//! Settings come from `--config`, else the first config file found in the
//! default locations, else built-in defaults. Environment variables override
//! the file:
//! - `GLUCOSE_DATABASE`: SQLite database path
//! - `GLUCOSE_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `GLUCOSE_API_PORT`: Port to listen on (default: 8000)
//! - `GLUCOSE_LOG_LEVEL` / `GLUCOSE_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Full tracing filter, wins over the configured level

use anyhow::Context;
use clap::Parser;
use glucose::api::{serve, AppState};
use glucose::config::Config;
use glucose::storage::LevelStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "glucose-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "HTTP API for stored glucose readings")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(database) = args.database {
        config.storage.database_path = database;
    }

    glucose::logging::init(&config.logging);

    tracing::info!("Starting Glucose API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {:?}", config.storage.database_path);

    let store = LevelStore::open(&config.storage).with_context(|| {
        format!(
            "failed to open database {}",
            config.storage.database_path.display()
        )
    })?;
    let store = Arc::new(store);

    match store.stats() {
        Ok(stats) => tracing::info!("Storage stats: {}", stats),
        Err(e) => tracing::warn!("Could not read storage stats: {}", e),
    }

    let state = AppState::new(store, config.api.clone());

    // Run server
    tracing::info!("Starting server on {}:{}", config.api.host, config.api.port);
    serve(state, &config.api).await?;

    tracing::info!("Glucose API server stopped");
    Ok(())
}
