//! In-memory mirror for tests and ephemeral sessions.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{LocalMirror, LocalSnapshot};
use crate::error::StorageError;

#[derive(Default)]
pub struct MemoryMirror {
    snapshot: RwLock<Option<LocalSnapshot>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the mirror, as if a previous session had written it.
    pub fn with_snapshot(snapshot: LocalSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl LocalMirror for MemoryMirror {
    async fn save_answers(
        &self,
        answers: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        let mut guard = self.snapshot.write().await;
        guard.get_or_insert_with(LocalSnapshot::default).answers = answers.clone();
        Ok(())
    }

    async fn save_step(&self, step_id: &str) -> Result<(), StorageError> {
        let mut guard = self.snapshot.write().await;
        guard.get_or_insert_with(LocalSnapshot::default).step_id = Some(step_id.to_string());
        Ok(())
    }

    async fn load(&self) -> Result<Option<LocalSnapshot>, StorageError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.snapshot.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn save_load_clear() {
        let mirror = MemoryMirror::new();
        assert!(mirror.load().await.unwrap().is_none());

        let mut answers = serde_json::Map::new();
        answers.insert("email".into(), json!("a@b.c"));
        mirror.save_answers(&answers).await.unwrap();
        mirror.save_step("contact").await.unwrap();

        let snap = mirror.load().await.unwrap().unwrap();
        assert_eq!(snap.answers["email"], "a@b.c");
        assert_eq!(snap.step_id.as_deref(), Some("contact"));

        mirror.clear().await.unwrap();
        assert!(mirror.load().await.unwrap().is_none());
    }
}
