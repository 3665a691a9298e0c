//! Glucose Record Storage
//!
//! This module owns persisted readings:
//!
//! - **types**: Record model (`GlucoseLevel`, `NewGlucoseLevel`) and `LevelFilter`
//! - **store**: SQLite-backed `LevelStore`
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   NewGlucoseLevel batch → validate → single transaction → rows with ids
//!
//! Read Path:
//!   LevelFilter → WHERE user/time bounds → ORDER BY timestamp, id → LIMIT
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use glucose::storage::{LevelFilter, LevelStore, NewGlucoseLevel, StorageConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LevelStore::open(&StorageConfig::new("./glucose.db"))?;
//!
//!     store.insert(&NewGlucoseLevel::new("alice", chrono::Utc::now(), 104.0))?;
//!
//!     let levels = store.query(&LevelFilter::all().user("alice").limit(10))?;
//!     println!("Found {} readings", levels.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use store::{LevelStore, StorageConfig, StorageStats};
pub use types::{GlucoseLevel, LevelFilter, NewGlucoseLevel};
