//! Alarm collection persistence.
//!
//! The whole collection is stored as one serialized JSON array under a
//! single fixed key. There are no per-alarm records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tracing::{debug, warn};

use rise_core::types::{Alarm, Timestamp};

use crate::db::Database;
use crate::error::StorageError;

/// Key-value blob store for the alarm collection.
#[async_trait]
pub trait AlarmPersistence: Send + Sync {
    /// Load the persisted collection. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<Alarm>>, StorageError>;

    /// Replace the persisted collection.
    async fn save(&self, alarms: &[Alarm]) -> Result<(), StorageError>;

    /// Copy the current blob aside so a later `save` cannot destroy it.
    ///
    /// Called after a failed `load`. Returns false when there was nothing to
    /// keep.
    async fn quarantine(&self) -> Result<bool, StorageError>;
}

/// Where an unreadable blob stored under `key` is kept.
pub fn quarantine_key(key: &str) -> String {
    format!("{}_unreadable", key)
}

/// SQLite-backed persistence using the `kv_store` table.
pub struct SqlitePersistence {
    db: Arc<Database>,
    key: String,
}

impl SqlitePersistence {
    pub fn new(db: Arc<Database>, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl AlarmPersistence for SqlitePersistence {
    async fn load(&self) -> Result<Option<Vec<Alarm>>, StorageError> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [&self.key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
        })?;

        match raw {
            Some(json) => {
                let alarms: Vec<Alarm> = serde_json::from_str(&json)?;
                debug!(key = %self.key, count = alarms.len(), "Alarm collection loaded");
                Ok(Some(alarms))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
        let json = serde_json::to_string(alarms)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                rusqlite::params![self.key, json, Timestamp::now().0],
            )?;
            Ok(())
        })?;
        debug!(key = %self.key, count = alarms.len(), "Alarm collection saved");
        Ok(())
    }

    async fn quarantine(&self) -> Result<bool, StorageError> {
        let backup = quarantine_key(&self.key);
        let copied = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 SELECT ?2, value, ?3 FROM kv_store WHERE key = ?1
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                rusqlite::params![self.key, backup, Timestamp::now().0],
            )
            .map_err(StorageError::from)
        })?;
        if copied > 0 {
            warn!(key = %self.key, backup = %backup, "Unreadable alarm collection set aside");
        }
        Ok(copied > 0)
    }
}

/// In-memory persistence holding the serialized blob.
///
/// Round-trips through JSON so it exercises the same encoding as the
/// database backend.
#[derive(Default)]
pub struct MemoryPersistence {
    blob: Mutex<Option<String>>,
    quarantined: Mutex<Option<String>>,
    failing_saves: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already persisted collection.
    pub fn with_alarms(alarms: &[Alarm]) -> Result<Self, StorageError> {
        Ok(Self::with_raw(serde_json::to_string(alarms)?))
    }

    /// Start with raw blob contents, e.g. a corrupted payload.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(raw.into())),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail, leaving the blob as it was.
    pub fn set_failing_saves(&self, failing: bool) {
        self.failing_saves.store(failing, Ordering::SeqCst);
    }

    /// The stored blob exactly as held.
    pub fn raw(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|blob| blob.clone())
    }

    /// The blob last set aside by `quarantine`.
    pub fn quarantined(&self) -> Option<String> {
        self.quarantined.lock().ok().and_then(|kept| kept.clone())
    }
}

#[async_trait]
impl AlarmPersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<Vec<Alarm>>, StorageError> {
        let blob = self
            .blob
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        match blob.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Database(
                "memory persistence set to fail".to_string(),
            ));
        }
        let json = serde_json::to_string(alarms)?;
        let mut blob = self
            .blob
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        *blob = Some(json);
        Ok(())
    }

    async fn quarantine(&self) -> Result<bool, StorageError> {
        let current = self
            .blob
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?
            .clone();
        let Some(raw) = current else {
            return Ok(false);
        };
        *self
            .quarantined
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))? = Some(raw);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rise_core::types::{AlarmId, DayOfWeek, NewAlarm};

    fn alarms() -> Vec<Alarm> {
        vec![
            Alarm::from_new(NewAlarm::at(6, 30), AlarmId::new(), Timestamp(1)),
            Alarm::from_new(
                NewAlarm::at(9, 0)
                    .with_label("Standup")
                    .with_repeat_days([DayOfWeek::Mon, DayOfWeek::Thu]),
                AlarmId::new(),
                Timestamp(2),
            ),
        ]
    }

    #[tokio::test]
    async fn test_sqlite_load_empty_returns_none() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = SqlitePersistence::new(db, "@rise_alarms");
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_save_then_load() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = SqlitePersistence::new(db, "@rise_alarms");
        let saved = alarms();
        store.save(&saved).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_sqlite_save_overwrites_single_key() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = SqlitePersistence::new(Arc::clone(&db), "@rise_alarms");
        store.save(&alarms()).await.unwrap();
        store.save(&[]).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(vec![]));
        let rows: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
                    .map_err(StorageError::from)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_sqlite_keys_are_isolated() {
        let db = Arc::new(Database::in_memory().unwrap());
        let a = SqlitePersistence::new(Arc::clone(&db), "a");
        let b = SqlitePersistence::new(Arc::clone(&db), "b");
        a.save(&alarms()).await.unwrap();
        assert!(b.load().await.unwrap().is_none());
        assert_eq!(b.key(), "b");
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rise.db");
        let saved = alarms();
        {
            let db = Arc::new(Database::new(&path).unwrap());
            SqlitePersistence::new(db, "@rise_alarms")
                .save(&saved)
                .await
                .unwrap();
        }
        let db = Arc::new(Database::new(&path).unwrap());
        let loaded = SqlitePersistence::new(db, "@rise_alarms")
            .load()
            .await
            .unwrap();
        assert_eq!(loaded, Some(saved));
    }

    #[tokio::test]
    async fn test_sqlite_corrupt_blob_is_error() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES ('@rise_alarms', '{oops', 0)",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        let store = SqlitePersistence::new(db, "@rise_alarms");
        assert!(matches!(
            store.load().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let store = MemoryPersistence::new();
        assert!(store.load().await.unwrap().is_none());
        let saved = alarms();
        store.save(&saved).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_memory_with_raw_corrupt() {
        let store = MemoryPersistence::with_raw("[{\"id\": 3}]");
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_quarantine_copies_blob_aside() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = SqlitePersistence::new(Arc::clone(&db), "@rise_alarms");
        assert!(!store.quarantine().await.unwrap());

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES ('@rise_alarms', '{oops', 0)",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(store.quarantine().await.unwrap());
        store.save(&alarms()).await.unwrap();

        let kept: String = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    [quarantine_key("@rise_alarms")],
                    |row| row.get(0),
                )
                .map_err(StorageError::from)
            })
            .unwrap();
        assert_eq!(kept, "{oops");
        assert_eq!(store.load().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_failing_saves_keep_previous_blob() {
        let store = MemoryPersistence::with_alarms(&alarms()).unwrap();
        let before = store.raw();
        store.set_failing_saves(true);

        assert!(matches!(
            store.save(&[]).await,
            Err(StorageError::Database(_))
        ));
        assert_eq!(store.raw(), before);

        store.set_failing_saves(false);
        store.save(&[]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_memory_quarantine() {
        let empty = MemoryPersistence::new();
        assert!(!empty.quarantine().await.unwrap());

        let store = MemoryPersistence::with_raw("not json");
        assert!(store.quarantine().await.unwrap());
        store.save(&[]).await.unwrap();
        assert_eq!(store.quarantined().as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn test_memory_with_alarms() {
        let saved = alarms();
        let store = MemoryPersistence::with_alarms(&saved).unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().len(), 2);
    }
}
