//! Level Store - SQLite-backed record storage
//!
//! Owns every persisted `GlucoseLevel`. Records are only ever inserted;
//! reads come back ordered by `(timestamp, id)` so equal timestamps keep
//! their insertion order.
//!
//! The connection sits behind a `Mutex` and every method is blocking.
//! Async callers should go through `tokio::task::spawn_blocking`.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{from_micros, to_micros, GlucoseLevel, LevelFilter, NewGlucoseLevel};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Path value that selects a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Configuration for the record store
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, or `:memory:`
    #[serde(default = "default_database_path", deserialize_with = "deserialize_path")]
    pub database_path: PathBuf,
}

fn deserialize_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    PathBuf::deserialize(deserializer).map(expand_home)
}

/// Replace a leading `~` with the home directory
fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("glucose").join("glucose.db"))
        .unwrap_or_else(|| PathBuf::from("glucose.db"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: expand_home(database_path.into()),
        }
    }

    /// Configuration for a throwaway in-memory store
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

/// Summary of the stored data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageStats {
    pub total_records: u64,
    pub users: u64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} records from {} users", self.total_records, self.users)?;
        if let (Some(earliest), Some(latest)) = (self.earliest, self.latest) {
            write!(f, " ({} .. {})", earliest.to_rfc3339(), latest.to_rfc3339())?;
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, timestamp, value FROM glucose_levels";

/// SQLite-backed store for glucose readings
pub struct LevelStore {
    conn: Mutex<Connection>,
    /// `None` for in-memory databases
    path: Option<PathBuf>,
}

impl LevelStore {
    /// Create or open a store
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        if config.is_in_memory() {
            return Self::open_in_memory();
        }

        let path = config.database_path.clone();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::create_schema(&conn)?;
        tracing::debug!(path = %path.display(), "Opened level store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Create a private in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn create_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS glucose_levels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL CHECK (length(user_id) > 0),
                timestamp INTEGER NOT NULL,
                value REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_levels_timestamp
                ON glucose_levels(timestamp, id);
            CREATE INDEX IF NOT EXISTS idx_levels_user_timestamp
                ON glucose_levels(user_id, timestamp, id);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("level store connection poisoned: {}", e)))
    }

    /// Insert a batch of readings in one transaction
    ///
    /// Either every reading is stored or none is. Returns the stored records
    /// with their assigned identifiers, in input order.
    pub fn insert_batch(&self, levels: &[NewGlucoseLevel]) -> StorageResult<Vec<GlucoseLevel>> {
        if levels.is_empty() {
            return Ok(Vec::new());
        }

        for level in levels {
            level.validate()?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(levels.len());

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO glucose_levels (user_id, timestamp, value) VALUES (?, ?, ?)",
            )?;

            for level in levels {
                let micros = to_micros(&level.timestamp);
                stmt.execute(params![level.user_id, micros, level.value])?;

                stored.push(GlucoseLevel {
                    id: tx.last_insert_rowid(),
                    user_id: level.user_id.clone(),
                    timestamp: decode_timestamp(micros)?,
                    value: level.value,
                });
            }
        }

        tx.commit()?;

        Ok(stored)
    }

    /// Insert a single reading
    pub fn insert(&self, level: &NewGlucoseLevel) -> StorageResult<GlucoseLevel> {
        self.insert_batch(std::slice::from_ref(level))?
            .pop()
            .ok_or_else(|| StorageError::Corruption("insert returned no record".to_string()))
    }

    /// Fetch all records matching a filter, ordered by timestamp
    pub fn query(&self, filter: &LevelFilter) -> StorageResult<Vec<GlucoseLevel>> {
        let mut levels = Vec::new();
        let conn = self.lock()?;
        scan_with(&conn, filter, &mut |level| {
            levels.push(level);
            Ok(())
        })?;
        Ok(levels)
    }

    /// Visit matching records one at a time, in timestamp order
    ///
    /// File-backed stores scan on a dedicated read-only connection so a slow
    /// consumer does not hold up writers. Returns the number of records visited.
    pub fn scan<F>(&self, filter: &LevelFilter, mut visit: F) -> StorageResult<usize>
    where
        F: FnMut(GlucoseLevel) -> StorageResult<()>,
    {
        match &self.path {
            Some(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                scan_with(&conn, filter, &mut visit)
            }
            None => {
                let conn = self.lock()?;
                scan_with(&conn, filter, &mut visit)
            }
        }
    }

    /// Fetch every record with the given identifier (zero or one)
    pub fn find_by_id(&self, id: i64) -> StorageResult<Vec<GlucoseLevel>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE id = ? ORDER BY timestamp ASC, id ASC",
            SELECT_COLUMNS
        ))?;

        let mut rows = stmt.query(params![id])?;
        let mut levels = Vec::new();
        while let Some(row) = rows.next()? {
            levels.push(row_to_level(row)?);
        }
        Ok(levels)
    }

    /// Get count of stored records
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM glucose_levels", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    /// Get record count, user count and covered time span
    pub fn stats(&self) -> StorageResult<StorageStats> {
        let conn = self.lock()?;
        let (total, users, min, max): (i64, i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT user_id), MIN(timestamp), MAX(timestamp)
             FROM glucose_levels",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(StorageStats {
            total_records: total as u64,
            users: users as u64,
            earliest: min.map(decode_timestamp).transpose()?,
            latest: max.map(decode_timestamp).transpose()?,
        })
    }

    /// Get the database file path (`None` when in memory)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Build the SELECT statement and its parameters for a filter
fn build_select(filter: &LevelFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(ref user_id) = filter.user_id {
        clauses.push("user_id = ?");
        values.push(Value::Text(user_id.clone()));
    }
    if let Some(start) = filter.start {
        clauses.push("timestamp >= ?");
        values.push(Value::Integer(to_micros(&start)));
    }
    if let Some(stop) = filter.stop {
        clauses.push("timestamp <= ?");
        values.push(Value::Integer(to_micros(&stop)));
    }

    let mut sql = SELECT_COLUMNS.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY timestamp ASC, id ASC");

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    (sql, values)
}

fn scan_with(
    conn: &Connection,
    filter: &LevelFilter,
    visit: &mut dyn FnMut(GlucoseLevel) -> StorageResult<()>,
) -> StorageResult<usize> {
    let (sql, values) = build_select(filter);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;

    let mut visited = 0;
    while let Some(row) = rows.next()? {
        visit(row_to_level(row)?)?;
        visited += 1;
    }
    Ok(visited)
}

fn row_to_level(row: &Row<'_>) -> StorageResult<GlucoseLevel> {
    let micros: i64 = row.get(2)?;
    Ok(GlucoseLevel {
        id: row.get(0)?,
        user_id: row.get(1)?,
        timestamp: decode_timestamp(micros)?,
        value: row.get(3)?,
    })
}

fn decode_timestamp(micros: i64) -> StorageResult<DateTime<Utc>> {
    from_micros(micros)
        .ok_or_else(|| StorageError::Corruption(format!("timestamp out of range: {}", micros)))
}
