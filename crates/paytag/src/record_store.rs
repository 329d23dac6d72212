//! Persistence for the transaction history.
//!
//! The history is one value under one key: a plain key-value collaborator,
//! not a database schema. A missing key reads as an empty history.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::OptionalExtension;

use crate::error::PayError;
use crate::history::LedgerSnapshot;

/// Trait for history storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait RecordStore: Send + Sync {
    /// Load the snapshot stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> Result<Option<LedgerSnapshot>, PayError>;

    /// Persist `snapshot` under `key`, replacing any previous value.
    fn save(&self, key: &str, snapshot: &LedgerSnapshot) -> Result<(), PayError>;
}

/// In-memory store. Fast but lost on restart.
pub struct InMemoryRecordStore {
    values: Mutex<HashMap<String, LedgerSnapshot>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, LedgerSnapshot>> {
        match self.values.lock() {
            Ok(v) => v,
            Err(poisoned) => {
                tracing::error!("record store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, key: &str) -> Result<Option<LedgerSnapshot>, PayError> {
        Ok(self.lock().get(key).cloned())
    }

    fn save(&self, key: &str, snapshot: &LedgerSnapshot) -> Result<(), PayError> {
        self.lock().insert(key.to_string(), snapshot.clone());
        Ok(())
    }
}

/// Persistent store backed by SQLite. Survives restarts.
pub struct SqliteRecordStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &str) -> Result<Self, PayError> {
        let conn = rusqlite::Connection::open(path).map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            PRAGMA journal_mode=WAL;",
        )
        .map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(c) => c,
            Err(poisoned) => {
                tracing::error!("record store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn store_err(e: rusqlite::Error) -> PayError {
    PayError::Store(e.to_string())
}

impl RecordStore for SqliteRecordStore {
    fn load(&self, key: &str) -> Result<Option<LedgerSnapshot>, PayError> {
        let json: Option<String> = self
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(store_err)?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, snapshot: &LedgerSnapshot) -> Result<(), PayError> {
        let json = serde_json::to_string(snapshot)?;
        self.lock()
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, json],
            )
            .map_err(store_err)?;
        Ok(())
    }
}
