//! Persisted key-value user preferences.
//!
//! Values are stored as JSON so a key can hold a number, a bool or a string,
//! the same way the player's settings file always has. Missing keys are never
//! an error: callers supply the default they want.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::error::PreferenceError;

pub const KEY_WIDTH: &str = "width";
pub const KEY_HEIGHT: &str = "height";
pub const KEY_X: &str = "X";
pub const KEY_Y: &str = "Y";
pub const KEY_NATIVE_FRAME: &str = "nativeFrame";
pub const KEY_ZOOM: &str = "zoom";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError>;

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Numeric view of a key. Integers are widened; anything else counts as absent.
    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }
}

/// SQLite-backed store living in the app data directory.
pub struct SqlitePreferences {
    conn: Mutex<Connection>,
}

impl SqlitePreferences {
    pub fn new(db_path: PathBuf) -> Result<Self, PreferenceError> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, PreferenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PreferenceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(SqlitePreferences {
            conn: Mutex::new(conn),
        })
    }

    fn read(&self, key: &str) -> Result<Option<Value>, PreferenceError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

impl PreferenceStore for SqlitePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("PREFS: could not read {key:?}, using default: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        let text = serde_json::to_string(&value)?;
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)",
            (key, &text, now),
        )?;
        log::debug!("PREFS: {key} = {text}");
        Ok(())
    }
}

/// Process-local store. Used when the database cannot be opened.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        MemoryPreferences {
            values: Mutex::new(values),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}
