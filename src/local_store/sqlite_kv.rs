use super::schema::KEY_VALUE_VERSIONED_SCHEMAS;
use super::KeyValueStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Key-value slots persisted in a SQLite database.
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValueStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        info!("Opening local notification database at {:?}", path);
        let mut conn = Connection::open(path).context("Failed to open local database")?;
        open_versioned(&mut conn, is_new_db, KEY_VALUE_VERSIONED_SCHEMAS, "local")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A throwaway store living in memory, for tests and ephemeral sessions.
    pub fn in_memory() -> Result<Self> {
        let mut conn =
            Connection::open_in_memory().context("Failed to open in-memory database")?;
        open_versioned(&mut conn, true, KEY_VALUE_VERSIONED_SCHEMAS, "local")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM key_value WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO key_value (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )
        .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM key_value WHERE key = ?1", params![key])?;
        Ok(())
    }
}
