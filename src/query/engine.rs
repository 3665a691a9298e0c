//! Query Engine
//!
//! Read-only access to stored readings: filtered, ordered, limited lists,
//! id lookups and streaming scans for export.

use crate::storage::{GlucoseLevel, LevelFilter, LevelStore, StorageResult};
use std::sync::Arc;

/// Executes reads against the record store
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<LevelStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<LevelStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LevelStore> {
        &self.store
    }

    /// Records matching `filter`, ordered by timestamp ascending
    pub fn list(&self, filter: &LevelFilter) -> StorageResult<Vec<GlucoseLevel>> {
        let levels = self.store.query(filter)?;
        tracing::debug!(?filter, results = levels.len(), "Listed levels");
        Ok(levels)
    }

    /// Records with the given surrogate id
    ///
    /// `None` means nothing matched. Ids that are not integers can never
    /// match and also yield `None`.
    pub fn find_by_id(&self, id: &str) -> StorageResult<Option<Vec<GlucoseLevel>>> {
        let Ok(id) = id.trim().parse::<i64>() else {
            return Ok(None);
        };

        let levels = self.store.find_by_id(id)?;
        if levels.is_empty() {
            Ok(None)
        } else {
            Ok(Some(levels))
        }
    }

    /// Visit matching records in order without collecting them
    pub fn scan<F>(&self, filter: &LevelFilter, visit: F) -> StorageResult<usize>
    where
        F: FnMut(GlucoseLevel) -> StorageResult<()>,
    {
        self.store.scan(filter, visit)
    }
}
