//! Glucose Query Engine
//!
//! Turns request parameters into storage filters and runs them.
//!
//! # Semantics
//!
//! - `user_id`: exact match, absent or empty means every user
//! - `start` / `stop`: inclusive bounds, unparseable values are ignored
//! - `limit`: non-negative integer applied after ordering, anything else is unbounded
//! - Results are ordered by timestamp ascending, ties in insertion order
//!
//! # Example
//!
//! ```rust,ignore
//! use glucose::query::{ListParams, QueryEngine};
//!
//! let params = ListParams {
//!     user_id: Some("alice".into()),
//!     start: Some("now-7d".into()),
//!     ..Default::default()
//! };
//! let levels = engine.list(&params.to_filter())?;
//! ```

mod engine;
mod params;

pub use engine::QueryEngine;
pub use params::{parse_instant, parse_limit, ListParams};
