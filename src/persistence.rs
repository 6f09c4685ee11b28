//! Key-value persistence for preferences and statistics.
//!
//! Both records are stored as JSON text under their own key. A missing or
//! unparsable record is replaced by its default, and failed writes are left
//! for the caller to log: in-memory state stays authoritative either way.

use crate::models::{Preferences, Statistics};
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const PREFERENCES_KEY: &str = "prefs";
pub const STATISTICS_KEY: &str = "stats";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
    #[error("Store is read-only")]
    ReadOnly,
}

/// Durable key-value storage for serialized records.
pub trait Store {
    /// Returns the raw record stored under `key`, if any.
    fn load(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous record.
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// SQLite-backed store with a single key/value table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens the database in the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&Self::default_path())
    }

    /// Opens (or creates) the database at `path`, initializing tables if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|_| StoreError::DirectoryCreation)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        debug!(path = %path.display(), "opened store");

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com", "pomoquest", "Pomoquest")
            .map(|dirs| dirs.data_dir().join("pomoquest.db"))
            .unwrap_or_else(|| PathBuf::from("pomoquest.db"))
    }
}

impl Store for SqliteStore {
    fn load(&self, key: &str) -> Option<String> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0));

        match result {
            Ok(value) => Some(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                warn!(key, error = %e, "failed to read record");
                None
            }
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Store that keeps records for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    #[cfg(test)]
    pub fn read_only() -> Self {
        Self {
            records: RefCell::default(),
            read_only: true,
        }
    }

    /// Seeds a raw record, bypassing serialization.
    #[cfg(test)]
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Loads a record, falling back to its default when absent or corrupt.
pub fn load_record<T: DeserializeOwned + Default>(store: &dyn Store, key: &str) -> T {
    match store.load(key) {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key, error = %e, "discarding unreadable record");
            T::default()
        }),
        None => T::default(),
    }
}

pub fn save_record<T: Serialize>(store: &dyn Store, key: &str, record: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string(record)?;
    store.save(key, &json)
}

pub fn load_preferences(store: &dyn Store) -> Preferences {
    let mut prefs: Preferences = load_record(store, PREFERENCES_KEY);
    prefs.normalize();
    prefs
}

pub fn save_preferences(store: &dyn Store, prefs: &Preferences) -> Result<(), StoreError> {
    save_record(store, PREFERENCES_KEY, prefs)
}

pub fn load_statistics(store: &dyn Store) -> Statistics {
    load_record(store, STATISTICS_KEY)
}

pub fn save_statistics(store: &dyn Store, stats: &Statistics) -> Result<(), StoreError> {
    save_record(store, STATISTICS_KEY, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_intervals, SoundChoice};
    use chrono::NaiveDate;

    #[test]
    fn test_store_creation() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_missing_key_loads_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load("nothing"), None);
    }

    #[test]
    fn test_save_overwrites_previous_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save("k", "one").unwrap();
        store.save("k", "two").unwrap();
        assert_eq!(store.load("k").as_deref(), Some("two"));
    }

    #[test]
    fn test_preferences_save_and_load() {
        let store = SqliteStore::open_in_memory().unwrap();

        // Defaults are returned when nothing is saved
        assert_eq!(load_preferences(&store), Preferences::default());

        let custom = Preferences {
            dark_mode: false,
            sound: SoundChoice::Soft,
            user_name: "Ana".to_string(),
            ..Preferences::default()
        };
        save_preferences(&store, &custom).unwrap();

        assert_eq!(load_preferences(&store), custom);
    }

    #[test]
    fn test_statistics_save_and_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stats = Statistics {
            xp: 70,
            total_work_intervals: 2,
            total_work_minutes: 50,
            streak_days: 2,
            completed_cycles: 1,
            ..Statistics::default()
        };
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        stats.day_mut(day).work_minutes = 50;
        stats.day_mut(day).work_intervals = 2;

        save_statistics(&store, &stats).unwrap();
        assert_eq!(load_statistics(&store), stats);
    }

    #[test]
    fn test_corrupt_record_falls_back_to_default() {
        let store = MemoryStore::new();
        store.insert_raw(STATISTICS_KEY, "{not json");
        store.insert_raw(PREFERENCES_KEY, "42");

        assert_eq!(load_statistics(&store), Statistics::default());
        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let store = MemoryStore::new();
        store.insert_raw(PREFERENCES_KEY, r#"{"userName":"Bo","darkMode":false}"#);
        store.insert_raw(STATISTICS_KEY, r#"{"xp":120}"#);

        let prefs = load_preferences(&store);
        assert_eq!(prefs.user_name, "Bo");
        assert!(!prefs.dark_mode);
        assert_eq!(prefs.intervals, default_intervals());
        assert_eq!(prefs.sound, SoundChoice::Bell);

        let stats = load_statistics(&store);
        assert_eq!(stats.xp, 120);
        assert_eq!(stats.total_work_intervals, 0);
        assert!(stats.daily.is_empty());
    }

    #[test]
    fn test_read_only_store_reports_write_failure() {
        let store = MemoryStore::read_only();
        let result = save_statistics(&store, &Statistics::default());
        assert!(matches!(result, Err(StoreError::ReadOnly)));
        assert_eq!(store.load(STATISTICS_KEY), None);
    }

    #[test]
    fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pomoquest.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let stats = Statistics {
                xp: 30,
                ..Statistics::default()
            };
            save_statistics(&store, &stats).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(load_statistics(&store).xp, 30);
    }
}
