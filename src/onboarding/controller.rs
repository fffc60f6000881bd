//! Flow controller: the navigation contract exposed to the UI surface.
//!
//! Composes the step graph, the gate and action tables, persistence and the
//! submission gate over one `FlowState`. User-triggered actions take a busy
//! flag for their whole duration; a second action while one is in flight
//! fails with `FlowError::Busy` rather than queueing.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::answers::keys::{self, reserved};
use crate::answers::{AnswerStore, AnswerValue, DocumentRef, StagedFile};
use crate::config::FlowConfig;
use crate::error::{FlowError, StorageError};
use crate::services::{Collaborators, DocumentMetadata, EvidenceSummary};
use crate::store::{LocalMirror, PersistenceAdapter};

use super::actions::{ActionContext, ActionTable};
use super::gates::GateTable;
use super::model::{FieldKind, StepDescriptor, StepGraph};
use super::state::{FlowState, StepError};
use super::submission::{SubmissionGate, SubmissionStatus};

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Navigation {
    Moved { from: &'static str, to: &'static str },
    /// The gate denied leaving the step. Nothing touched the network.
    Blocked { step_id: &'static str },
    AtEnd { step_id: &'static str },
    AtStart { step_id: &'static str },
    /// Submitted applications no longer move.
    Locked { step_id: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Saved locally and as a remote draft.
    Drafted,
    /// No application exists yet, so only the local mirror was written.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted,
    AlreadySubmitted,
    Blocked(SubmissionStatus),
}

/// Serializable view of the whole flow for renderers.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub current_step: &'static str,
    pub visible_index: Option<usize>,
    pub visible_steps: Vec<&'static str>,
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub show_validation_errors: bool,
    pub last_error: Option<StepError>,
    pub is_busy: bool,
    pub resume_mode: bool,
    pub authenticated: bool,
    pub submission: SubmissionStatus,
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, FlowError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FlowError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn application_id(answers: &AnswerStore) -> Option<String> {
    answers.text(reserved::APPLICATION_ID).map(str::to_string)
}

/// Drives one applicant through the step graph.
pub struct FlowController {
    graph: StepGraph,
    gates: GateTable,
    actions: ActionTable,
    submission: SubmissionGate,
    services: Collaborators,
    persistence: PersistenceAdapter,
    config: FlowConfig,
    known_keys: HashSet<&'static str>,
    state: RwLock<FlowState>,
    busy: AtomicBool,
}

impl FlowController {
    /// Controller with the default gate and action tables.
    pub fn new(
        graph: StepGraph,
        services: Collaborators,
        local: Arc<dyn LocalMirror>,
        config: FlowConfig,
    ) -> Self {
        let submission = SubmissionGate::new(config.bypass_evidence_check);
        let gates = GateTable::defaults(&config, submission);
        Self::with_tables(graph, gates, ActionTable::defaults(), services, local, config)
    }

    pub fn with_tables(
        graph: StepGraph,
        gates: GateTable,
        actions: ActionTable,
        services: Collaborators,
        local: Arc<dyn LocalMirror>,
        config: FlowConfig,
    ) -> Self {
        let persistence = PersistenceAdapter::new(local, services.drafts.clone(), graph.sensitive_keys());
        Self {
            known_keys: graph.known_keys(),
            submission: SubmissionGate::new(config.bypass_evidence_check),
            graph,
            gates,
            actions,
            services,
            persistence,
            config,
            state: RwLock::new(FlowState::new()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn visible_steps(&self) -> Vec<StepDescriptor> {
        let state = self.state.read().await;
        self.graph
            .visible_steps(&state.answers, state.context())
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn current_step(&self) -> Option<StepDescriptor> {
        self.state.read().await.current_step(&self.graph).cloned()
    }

    pub async fn visible_index(&self) -> Option<usize> {
        self.state.read().await.visible_index(&self.graph)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn has_submitted(&self) -> bool {
        SubmissionGate::has_submitted(&self.state.read().await.answers)
    }

    pub async fn show_validation_errors(&self) -> bool {
        self.state.read().await.show_validation_errors
    }

    pub async fn last_error(&self) -> Option<StepError> {
        self.state.read().await.last_error.clone()
    }

    pub async fn can_submit(&self) -> bool {
        self.submission.can_submit(&self.state.read().await.answers)
    }

    pub async fn submission_status(&self) -> SubmissionStatus {
        self.submission.status(&self.state.read().await.answers)
    }

    pub async fn answers(&self) -> AnswerStore {
        self.state.read().await.answers.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.session.is_some()
    }

    pub async fn snapshot(&self) -> FlowSnapshot {
        let state = self.state.read().await;
        FlowSnapshot {
            current_step: state.current_step_id(&self.graph),
            visible_index: state.visible_index(&self.graph),
            visible_steps: state.visible_ids(&self.graph),
            answers: self.persistence.persistable(&state.answers),
            show_validation_errors: state.show_validation_errors,
            last_error: state.last_error.clone(),
            is_busy: self.is_busy(),
            resume_mode: state.resume_mode,
            authenticated: state.session.is_some(),
            submission: self.submission.status(&state.answers),
        }
    }

    // ── Answer mutation ─────────────────────────────────────────────────

    /// Write one answer. Only keys declared as a step field are accepted.
    pub async fn set_answer(&self, key: &str, value: impl Into<AnswerValue>) -> Result<(), FlowError> {
        self.set_answers([(key.to_string(), value.into())]).await
    }

    /// Write several answers at once. Rejects the whole batch on an unknown key
    /// or a documents field, which only `attach_document` fills.
    pub async fn set_answers<I>(&self, values: I) -> Result<(), FlowError>
    where
        I: IntoIterator<Item = (String, AnswerValue)>,
    {
        let values: Vec<_> = values.into_iter().collect();
        for (key, _) in &values {
            match self.graph.field(key) {
                None => return Err(FlowError::UnknownField { key: key.clone() }),
                Some(field) if field.kind == FieldKind::Documents => {
                    return Err(FlowError::ReadOnlyField { key: key.clone() });
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        if SubmissionGate::has_submitted(&state.answers) {
            return Err(FlowError::AlreadySubmitted);
        }
        for (key, value) in values {
            state.answers.set(key, value);
        }
        self.persistence.mirror_answers(&state.answers).await;
        self.repair_locked(&mut state).await;
        Ok(())
    }

    /// Stage a binary payload on a file field. Staged files are never persisted.
    pub async fn stage_file(&self, key: &str, file: StagedFile) -> Result<(), FlowError> {
        match self.graph.field(key) {
            Some(field) if field.kind == FieldKind::File => self.set_answer(key, file).await,
            _ => Err(FlowError::UnknownField {
                key: key.to_string(),
            }),
        }
    }

    /// Upload a supporting document and record it under the documents answer.
    pub async fn attach_document(&self, document_type: &str, file: StagedFile) -> Result<DocumentRef, FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let (metadata, step_id) = {
            let state = self.state.read().await;
            if SubmissionGate::has_submitted(&state.answers) {
                return Err(FlowError::AlreadySubmitted);
            }
            let application_id = application_id(&state.answers).ok_or(FlowError::NoApplication)?;
            let metadata = DocumentMetadata {
                application_id,
                document_type: document_type.to_string(),
                applicant_id: state.answers.text(reserved::APPLICANT_ID).map(str::to_string),
            };
            (metadata, state.current_step_id(&self.graph))
        };

        let receipt = match self.services.intake.upload(&file, &metadata).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(step_id, e.into()).await),
        };

        let document = DocumentRef {
            document_id: receipt.document_id,
            document_type: document_type.to_string(),
            file_name: Some(file.file_name),
        };
        let json = serde_json::to_value(&document).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut state = self.state.write().await;
        let mut documents = state.answers.object(keys::DOCUMENTS).cloned().unwrap_or_default();
        documents.insert(document_type.to_string(), json);
        state.answers.set(keys::DOCUMENTS, AnswerValue::Object(documents));
        state.last_error = None;
        self.persistence.mirror_answers(&state.answers).await;
        self.repair_locked(&mut state).await;

        info!(document_id = %document.document_id, document_type, "Document attached");
        Ok(document)
    }

    // ── Navigation ──────────────────────────────────────────────────────

    /// Leave the current step: gate, then action, then draft, then move.
    pub async fn go_next(&self) -> Result<Navigation, FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let (from, answers) = {
            let mut state = self.state.write().await;
            self.repair_locked(&mut state).await;
            let from = state.current_step_id(&self.graph);
            if SubmissionGate::has_submitted(&state.answers) {
                return Ok(Navigation::Locked { step_id: from });
            }
            if self.next_visible(&state).is_none() {
                return Ok(Navigation::AtEnd { step_id: from });
            }
            if !self.gates.can_leave(from, &state.answers) {
                state.show_validation_errors = true;
                debug!(step_id = from, "Gate denied advancement");
                return Ok(Navigation::Blocked { step_id: from });
            }
            (from, state.answers.clone())
        };

        let ctx = ActionContext {
            answers: &answers,
            services: &self.services,
            config: &self.config,
        };
        let output = match self.actions.run(from, ctx).await {
            Ok(output) => output,
            Err(e) => return Err(self.fail(from, e).await),
        };
        if let Some(key) = output.patch.keys().find(|k| !self.known_keys.contains(*k)) {
            let e = FlowError::UnknownField { key: key.to_string() };
            return Err(self.fail(from, e).await);
        }

        let (to_index, to, answers) = {
            let mut state = self.state.write().await;
            state.answers.apply(output.patch);
            if output.session.is_some() {
                state.session = output.session;
            }
            state.last_error = None;
            self.persistence.mirror_answers(&state.answers).await;
            match self.next_visible(&state) {
                Some((index, id)) => (index, id, state.answers.clone()),
                None => return Ok(Navigation::AtEnd { step_id: from }),
            }
        };

        let draft_error = self.push_navigation_draft(from, to, &answers).await;
        self.settle_move(to_index, draft_error).await;
        info!(from, to, "Advanced");

        if to == self.graph.terminal_id() && answers.has(reserved::APPLICATION_ID) {
            // Failure is already surfaced as the step error; the move stands.
            let _ = self.load_evidence().await;
        }

        Ok(Navigation::Moved { from, to })
    }

    /// Step back one visible step. Never gated.
    pub async fn go_back(&self) -> Result<Navigation, FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let (from, to_index, to, answers) = {
            let mut state = self.state.write().await;
            self.repair_locked(&mut state).await;
            let from = state.current_step_id(&self.graph);
            if SubmissionGate::has_submitted(&state.answers) {
                return Ok(Navigation::Locked { step_id: from });
            }
            let Some((index, id)) = self.previous_visible(&state) else {
                return Ok(Navigation::AtStart { step_id: from });
            };
            (from, index, id, state.answers.clone())
        };

        let draft_error = self.push_navigation_draft(from, to, &answers).await;
        self.settle_move(to_index, draft_error).await;
        debug!(from, to, "Went back");
        Ok(Navigation::Moved { from, to })
    }

    /// Persist everything now. The draft failure, if any, is returned.
    pub async fn save_and_exit(&self) -> Result<SaveOutcome, FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let (step_id, answers) = {
            let state = self.state.read().await;
            (state.current_step_id(&self.graph), state.answers.clone())
        };
        self.persistence.mirror_answers(&answers).await;
        self.persistence.mirror_step(step_id).await;

        let Some(application_id) = application_id(&answers) else {
            return Ok(SaveOutcome::LocalOnly);
        };
        match self.persistence.push_draft(&application_id, step_id, &answers).await {
            Ok(()) => {
                self.state.write().await.last_error = None;
                info!(application_id = %application_id, step_id, "Saved for later");
                Ok(SaveOutcome::Drafted)
            }
            Err(e) => Err(self.fail(step_id, e).await),
        }
    }

    /// Clear the answers, the local mirror and the position.
    pub async fn reset(&self) -> Result<(), FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        *self.state.write().await = FlowState::new();
        self.persistence.clear_local().await?;
        info!("Flow reset");
        Ok(())
    }

    /// Re-fetch the evidence summary. Safe to run alongside an automatic refresh.
    pub async fn refresh_evidence(&self) -> Result<EvidenceSummary, FlowError> {
        self.load_evidence().await
    }

    /// Fire the final submission. One-shot per application.
    pub async fn submit(&self) -> Result<SubmitOutcome, FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let terminal = self.graph.terminal_id();

        let (application_id, payload, idempotency_key) = {
            let mut state = self.state.write().await;
            if SubmissionGate::has_submitted(&state.answers) {
                return Ok(SubmitOutcome::AlreadySubmitted);
            }
            let at_terminal = state.current_step_id(&self.graph) == terminal;
            if !at_terminal || !self.submission.can_submit(&state.answers) {
                state.show_validation_errors = true;
                return Ok(SubmitOutcome::Blocked(self.submission.status(&state.answers)));
            }
            let application_id = application_id(&state.answers).ok_or(FlowError::NoApplication)?;
            (
                application_id,
                self.persistence.persistable(&state.answers),
                state.submission_key,
            )
        };

        if let Err(e) = self
            .services
            .submission
            .submit(&application_id, &payload, idempotency_key)
            .await
        {
            return Err(self.fail(terminal, e.into()).await);
        }

        let answers = {
            let mut state = self.state.write().await;
            state.answers.set(reserved::SUBMITTED, true);
            state.answers.set(reserved::SUBMITTED_AT, Utc::now().to_rfc3339());
            state.last_error = None;
            self.persistence.mirror_answers(&state.answers).await;
            state.answers.clone()
        };
        info!(application_id = %application_id, "Application submitted");

        if let Err(e) = self.persistence.push_draft(&application_id, terminal, &answers).await {
            warn!(application_id = %application_id, "Failed to save submitted draft: {}", e);
        }
        Ok(SubmitOutcome::Submitted)
    }

    // ── Resumption ──────────────────────────────────────────────────────

    /// Load a remote draft and continue from its step in resume mode.
    pub async fn resume(&self, application_id: &str) -> Result<(), FlowError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let draft = self
            .persistence
            .pull_draft(application_id)
            .await?
            .ok_or_else(|| FlowError::DraftNotFound {
                application_id: application_id.to_string(),
            })?;

        let mut state = self.state.write().await;
        let session = state.session.take();
        *state = FlowState::new();
        state.session = session;
        state.resume_mode = true;
        state.answers = AnswerStore::from_json_map(draft.draft_answers);
        state.answers.set(reserved::APPLICATION_ID, application_id);
        state.position = match self.graph.index_of(&draft.current_step_id) {
            Some(index) => index,
            None => {
                warn!(step_id = %draft.current_step_id, "Draft points at an unknown step, starting over");
                0
            }
        };
        state.repair(&self.graph);

        let step_id = state.current_step_id(&self.graph);
        self.persistence.mirror_answers(&state.answers).await;
        self.persistence.mirror_step(step_id).await;
        info!(application_id, step_id, "Resumed from draft");
        Ok(())
    }

    /// Reload answers and position from the local mirror. Returns whether
    /// anything was found.
    pub async fn restore_local(&self) -> Result<bool, FlowError> {
        let Some(snapshot) = self.persistence.restore_local().await? else {
            return Ok(false);
        };

        let mut state = self.state.write().await;
        state.answers = AnswerStore::from_json_map(snapshot.answers);
        state.position = snapshot
            .step_id
            .as_deref()
            .and_then(|id| self.graph.index_of(id))
            .unwrap_or(0);
        state.repair(&self.graph);
        debug!(step_id = state.current_step_id(&self.graph), "Restored from local mirror");
        Ok(true)
    }

    /// Jump to an externally supplied resume pointer.
    pub async fn start_at(&self, step_id: &str) -> Result<&'static str, FlowError> {
        let index = self.graph.index_of(step_id).ok_or_else(|| FlowError::UnknownStep {
            id: step_id.to_string(),
        })?;
        let mut state = self.state.write().await;
        state.move_to(index);
        state.repair(&self.graph);
        let current = state.current_step_id(&self.graph);
        self.persistence.mirror_step(current).await;
        Ok(current)
    }

    /// Run the position repair explicitly. Returns the current step id.
    pub async fn repair_position(&self) -> &'static str {
        let mut state = self.state.write().await;
        self.repair_locked(&mut state).await;
        state.current_step_id(&self.graph)
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn repair_locked(&self, state: &mut FlowState) {
        if state.repair(&self.graph) {
            let step_id = state.current_step_id(&self.graph);
            debug!(step_id, "Position repaired");
            self.persistence.mirror_step(step_id).await;
        }
    }

    fn next_visible(&self, state: &FlowState) -> Option<(usize, &'static str)> {
        let ctx = state.context();
        self.graph
            .steps()
            .iter()
            .enumerate()
            .skip(state.position + 1)
            .find(|(_, s)| self.graph.is_visible(s, &state.answers, ctx))
            .map(|(i, s)| (i, s.id))
    }

    fn previous_visible(&self, state: &FlowState) -> Option<(usize, &'static str)> {
        let ctx = state.context();
        self.graph
            .steps()
            .iter()
            .enumerate()
            .take(state.position)
            .rev()
            .find(|(_, s)| self.graph.is_visible(s, &state.answers, ctx))
            .map(|(i, s)| (i, s.id))
    }

    /// Draft push made on navigation. A failure is reported but never blocks the move.
    async fn push_navigation_draft(&self, from: &str, to: &str, answers: &AnswerStore) -> Option<StepError> {
        let application_id = application_id(answers)?;
        match self.persistence.push_draft(&application_id, to, answers).await {
            Ok(()) => None,
            Err(e) => {
                warn!(application_id = %application_id, step_id = from, "Draft save failed: {}", e);
                Some(StepError::new(from, &e))
            }
        }
    }

    async fn settle_move(&self, to_index: usize, error: Option<StepError>) {
        let mut state = self.state.write().await;
        state.move_to(to_index);
        state.last_error = error;
        state.repair(&self.graph);
        self.persistence
            .mirror_step(state.current_step_id(&self.graph))
            .await;
    }

    async fn load_evidence(&self) -> Result<EvidenceSummary, FlowError> {
        let (application_id, step_id) = {
            let state = self.state.read().await;
            (application_id(&state.answers), state.current_step_id(&self.graph))
        };
        let application_id = application_id.ok_or(FlowError::NoApplication)?;

        let summary = match self.services.evidence.fetch_summary(&application_id).await {
            Ok(summary) => summary,
            Err(e) => return Err(self.fail(step_id, e.into()).await),
        };
        let raw = serde_json::to_value(&summary).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut state = self.state.write().await;
        state.answers.set(reserved::EVIDENCE_SUMMARY, AnswerValue::from_json(raw));
        self.persistence.mirror_answers(&state.answers).await;
        debug!(
            application_id = %application_id,
            missing = summary.missing_document_types.len(),
            "Evidence summary refreshed"
        );
        Ok(summary)
    }

    /// Record an operational error against `step_id` and hand it back.
    async fn fail(&self, step_id: &str, error: FlowError) -> FlowError {
        warn!(step_id, "Step action failed: {}", error);
        self.state.write().await.last_error = Some(StepError::new(step_id, &error));
        error
    }
}
