//! # Glucose
//!
//! Ingestion, query and export service for continuous glucose monitor readings.
//!
//! ## Features
//!
//! - **CSV ingestion**: vendor exports parsed through configurable column profiles
//! - **Per-file fault isolation**: a bad file is reported, the batch carries on
//! - **Lenient queries**: user/time-range/limit filters, malformed bounds ignored
//! - **Streaming export**: CSV written row by row straight from the store
//!
//! ## Modules
//!
//! - [`storage`]: SQLite record store
//! - [`ingest`]: CSV ingestor and ingest reports
//! - [`query`]: Query parameters and engine
//! - [`export`]: CSV export formatter
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glucose::ingest::{CsvIngestor, IngestConfig};
//! use glucose::storage::{LevelFilter, LevelStore, StorageConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LevelStore::open(&StorageConfig::new("glucose.db"))?);
//!
//!     // Load every CSV export in ./data, one user per file
//!     let ingestor = Arc::new(CsvIngestor::new(IngestConfig::default()));
//!     let report = ingestor.ingest_dir(Arc::clone(&store), Path::new("data")).await?;
//!     println!("{}", report);
//!
//!     // Read back one user's readings in time order
//!     let levels = store.query(&LevelFilter::all().user("alice"))?;
//!     println!("Found {} readings", levels.len());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    GlucoseLevel, LevelFilter, LevelStore, NewGlucoseLevel, StorageConfig, StorageError,
    StorageResult, StorageStats,
};

pub use ingest::{CsvIngestor, IngestConfig, IngestError, IngestReport};

pub use query::{ListParams, QueryEngine};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
