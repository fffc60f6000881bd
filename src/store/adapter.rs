//! Persistence adapter: local mirror and remote draft behind one interface.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::traits::{LocalMirror, LocalSnapshot};
use crate::answers::AnswerStore;
use crate::error::{FlowError, StorageError};
use crate::services::{DraftRecord, DraftStore};

/// Composes the two persistence strategies.
///
/// The mirror is written on every answer change; the draft only at
/// navigation points and explicit saves.
#[derive(Clone)]
pub struct PersistenceAdapter {
    local: Arc<dyn LocalMirror>,
    remote: Arc<dyn DraftStore>,
    excluded: HashSet<&'static str>,
}

impl PersistenceAdapter {
    /// `excluded` keys (secrets) are never written by either strategy.
    pub fn new(
        local: Arc<dyn LocalMirror>,
        remote: Arc<dyn DraftStore>,
        excluded: HashSet<&'static str>,
    ) -> Self {
        Self {
            local,
            remote,
            excluded,
        }
    }

    /// Persistable JSON form of `answers`.
    pub fn persistable(&self, answers: &AnswerStore) -> serde_json::Map<String, serde_json::Value> {
        answers.to_persisted(&self.excluded)
    }

    /// Mirror the answers locally. Failures are logged, never raised.
    pub async fn mirror_answers(&self, answers: &AnswerStore) {
        if let Err(e) = self.local.save_answers(&self.persistable(answers)).await {
            warn!("Failed to mirror answers locally: {}", e);
        }
    }

    /// Mirror the last known step id locally. Failures are logged.
    pub async fn mirror_step(&self, step_id: &str) {
        if let Err(e) = self.local.save_step(step_id).await {
            warn!(step_id, "Failed to mirror step locally: {}", e);
        }
    }

    pub async fn restore_local(&self) -> Result<Option<LocalSnapshot>, StorageError> {
        self.local.load().await
    }

    pub async fn clear_local(&self) -> Result<(), StorageError> {
        self.local.clear().await
    }

    /// Push the durable draft (current step + full answers).
    pub async fn push_draft(
        &self,
        application_id: &str,
        step_id: &str,
        answers: &AnswerStore,
    ) -> Result<(), FlowError> {
        let draft = DraftRecord {
            current_step_id: step_id.to_string(),
            draft_answers: self.persistable(answers),
        };
        self.remote.save_draft(application_id, &draft).await?;
        debug!(application_id, step_id, "Draft saved");
        Ok(())
    }

    pub async fn pull_draft(&self, application_id: &str) -> Result<Option<DraftRecord>, FlowError> {
        Ok(self.remote.load_draft(application_id).await?)
    }
}
