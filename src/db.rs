//! Session persistence
//!
//! The widget only ever needs a flat, session-scoped key/value map. The
//! [`KeyValueStore`] capability is injected wherever state is persisted so
//! the backing store can be swapped (SQLite on disk, in-memory for tests).

mod schema;

pub use schema::SCHEMA;

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    LockPoisoned,
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Session-scoped key/value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> DbResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> DbResult<()>;

    fn remove(&self, key: &str) -> DbResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> DbResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        (**self).remove(key)
    }
}

/// Thread-safe SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM session_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO session_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        conn.execute("DELETE FROM session_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Process-local store, lost when the process exits
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| DbError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let mut entries = self.entries.lock().map_err(|_| DbError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        let mut entries = self.entries.lock().map_err(|_| DbError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}
