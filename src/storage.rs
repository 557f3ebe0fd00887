//! Durable slot storage: string values under fixed string keys.
//!
//! Two backends: libSQL (a single `slots` table) and in-memory. Absence of a
//! slot always means "empty"; there is no schema versioning.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StorageError;

/// Slot holding the in-progress answers snapshot.
pub const ANSWERS_SLOT: &str = "coralOnboardingAnswers";
/// Slot holding the final-submission snapshot.
pub const SUBMISSION_SLOT: &str = "coralOnboardingSubmission";

/// Backend-agnostic key/value slot storage.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    /// Read a slot. `Ok(None)` when it was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write (or overwrite) a slot.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// In-memory slots, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.slots.write().await.remove(key).is_some())
    }
}

/// libSQL-backed slots.
///
/// `libsql::Connection` is `Send + Sync`, so one connection serves every call.
pub struct LibSqlStorage {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStorage {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Open(format!("Failed to create storage directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to open libSQL database: {e}")))?;

        let storage = Self::from_database(db).await?;
        info!(path = %path.display(), "Slot storage opened");
        Ok(storage)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to create in-memory database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StorageError> {
        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("Failed to create connection: {e}")))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| StorageError::Open(format!("Failed to create slots table: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl SlotStorage for LibSqlStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut rows = self
            .conn
            .query("SELECT value FROM slots WHERE key = ?1", params![key])
            .await
            .map_err(|e| StorageError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| StorageError::Query(format!("get: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .await
            .map_err(|e| StorageError::Query(format!("set: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let count = self
            .conn
            .execute("DELETE FROM slots WHERE key = ?1", params![key])
            .await
            .map_err(|e| StorageError::Query(format!("remove: {e}")))?;
        Ok(count > 0)
    }
}
