//! libSQL backend: `LocalMirror` over a local key/value table.
//!
//! Plays the role of browser local storage: two fixed keys, values stored
//! as JSON text, overwritten on every save.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use super::migrations;
use super::traits::{ANSWERS_STORAGE_KEY, LocalMirror, LocalSnapshot, STEP_STORAGE_KEY};
use crate::error::StorageError;

/// libSQL mirror backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlMirror {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlMirror {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Local mirror opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StorageError> {
        let conn = db
            .connect()
            .map_err(|e| StorageError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .await
            .map_err(|e| StorageError::Query(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut rows = self
            .conn
            .query("SELECT value FROM local_storage WHERE key = ?1", params![key])
            .await
            .map_err(|e| StorageError::Query(format!("get {key}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map(Some)
                .map_err(|e| StorageError::Query(format!("get {key}: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get {key}: {e}"))),
        }
    }
}

#[async_trait]
impl LocalMirror for LibSqlMirror {
    async fn save_answers(
        &self,
        answers: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(answers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.put(ANSWERS_STORAGE_KEY, &json).await
    }

    async fn save_step(&self, step_id: &str) -> Result<(), StorageError> {
        self.put(STEP_STORAGE_KEY, step_id).await
    }

    async fn load(&self) -> Result<Option<LocalSnapshot>, StorageError> {
        let answers = self.get(ANSWERS_STORAGE_KEY).await?;
        let step_id = self.get(STEP_STORAGE_KEY).await?;

        if answers.is_none() && step_id.is_none() {
            return Ok(None);
        }

        let answers = match answers {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!("Mirrored answers are not a JSON object, ignoring");
                    serde_json::Map::new()
                }
            },
            None => serde_json::Map::new(),
        };

        Ok(Some(LocalSnapshot { answers, step_id }))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.conn
            .execute(
                "DELETE FROM local_storage WHERE key IN (?1, ?2)",
                params![ANSWERS_STORAGE_KEY, STEP_STORAGE_KEY],
            )
            .await
            .map_err(|e| StorageError::Query(format!("clear: {e}")))?;
        Ok(())
    }
}
