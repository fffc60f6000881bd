//! `LocalMirror` trait: same-device copy of the answer store.
//!
//! The mirror is written on every answer mutation and read only to resume a
//! session that never reached the server (no application id yet).

use async_trait::async_trait;

use crate::error::StorageError;

/// Fixed storage key for the mirrored answers.
pub const ANSWERS_STORAGE_KEY: &str = "kyc_onboarding.answers";
/// Secondary key holding only the last known step id.
pub const STEP_STORAGE_KEY: &str = "kyc_onboarding.step";

/// What the mirror holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSnapshot {
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub step_id: Option<String>,
}

/// Backend-agnostic local mirror.
#[async_trait]
pub trait LocalMirror: Send + Sync {
    /// Overwrite the mirrored answers.
    async fn save_answers(
        &self,
        answers: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StorageError>;

    /// Overwrite the last known step id.
    async fn save_step(&self, step_id: &str) -> Result<(), StorageError>;

    /// Read the mirror. `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<LocalSnapshot>, StorageError>;

    /// Remove both keys.
    async fn clear(&self) -> Result<(), StorageError>;
}
