//! Transition action table: side effects run when leaving a step.
//!
//! An action sees a snapshot of the answers and returns the writes it wants
//! applied. The controller applies them only when the action succeeds, so a
//! failed action never leaves partial writes behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join;
use tracing::{debug, info, warn};

use crate::answers::keys::{self, auth_modes, flow_variants, reserved};
use crate::answers::{AnswerPatch, AnswerStore, AnswerValue, DocumentRef, StagedFile};
use crate::config::FlowConfig;
use crate::error::{FlowError, RemoteError};
use crate::services::{AccountType, Collaborators, ContactInfo, DocumentMetadata, RiskQuestions, Session};

use super::catalog::step_ids;

/// Extracted document fields that may be merged into the answers.
const EXTRACTABLE_FIELDS: &[&str] = &[reserved::DATE_OF_BIRTH, reserved::NATIONALITY];

/// What an action may read.
pub struct ActionContext<'a> {
    pub answers: &'a AnswerStore,
    pub services: &'a Collaborators,
    pub config: &'a FlowConfig,
}

/// What an action hands back on success.
#[derive(Debug, Default)]
pub struct ActionOutput {
    pub patch: AnswerPatch,
    /// A session issued during the action. Kept on the controller, never in the answers.
    pub session: Option<Session>,
}

impl ActionOutput {
    pub fn patch(patch: AnswerPatch) -> Self {
        Self {
            patch,
            session: None,
        }
    }
}

/// An asynchronous side effect bound to a step id.
///
/// Must be safe to call again after a failure.
#[async_trait]
pub trait TransitionAction: Send + Sync {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, FlowError>;
}

/// Map from step id to action. Steps without an entry simply advance.
#[derive(Clone, Default)]
pub struct ActionTable {
    actions: HashMap<&'static str, Arc<dyn TransitionAction>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step_id: &'static str, action: Arc<dyn TransitionAction>) {
        self.actions.insert(step_id, action);
    }

    pub fn with(mut self, step_id: &'static str, action: Arc<dyn TransitionAction>) -> Self {
        self.register(step_id, action);
        self
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.actions.contains_key(step_id)
    }

    /// Run the action for `step_id`, or succeed with no writes.
    pub async fn run(&self, step_id: &str, ctx: ActionContext<'_>) -> Result<ActionOutput, FlowError> {
        match self.actions.get(step_id) {
            Some(action) => action.run(ctx).await,
            None => Ok(ActionOutput::default()),
        }
    }

    /// Actions for the built-in catalog.
    pub fn defaults() -> Self {
        Self::new()
            .with(step_ids::ACCOUNT, Arc::new(AccountAction))
            .with(step_ids::IDENTITY, Arc::new(IdentityAction))
            .with(step_ids::BUSINESS_CLASSIFICATION, Arc::new(ClassificationAction))
    }
}

fn required_text<'a>(answers: &'a AnswerStore, step: &str, field: &str) -> Result<&'a str, FlowError> {
    answers.text(field).ok_or_else(|| FlowError::MissingPrerequisite {
        step: step.to_string(),
        field: field.to_string(),
    })
}

/// Creates the application or signs a returning applicant in.
pub struct AccountAction;

impl AccountAction {
    async fn create(&self, ctx: &ActionContext<'_>, email: &str) -> Result<ActionOutput, FlowError> {
        let answers = ctx.answers;
        if answers.has(reserved::APPLICATION_ID) {
            debug!("Application already created, skipping registration");
            return Ok(ActionOutput::default());
        }

        let account_type = required_text(answers, step_ids::ACCOUNT, keys::ACCOUNT_TYPE)?;
        let account_type = AccountType::parse(account_type).ok_or_else(|| FlowError::MissingPrerequisite {
            step: step_ids::ACCOUNT.to_string(),
            field: keys::ACCOUNT_TYPE.to_string(),
        })?;

        let contact = ContactInfo {
            email: email.to_string(),
            first_name: answers.text(keys::FIRST_NAME).map(str::to_string),
            last_name: answers.text(keys::LAST_NAME).map(str::to_string),
        };

        let handle = ctx
            .services
            .registrar
            .create_application(account_type, &contact)
            .await
            .map_err(|e| match e {
                RemoteError::AccountExists { .. } => FlowError::AccountExists {
                    email: email.to_string(),
                },
                other => FlowError::Remote(other),
            })?;

        info!(application_id = %handle.application_id, %account_type, "Application created");

        // Profile pre-creation runs detached; its outcome never gates the step.
        let registrar = ctx.services.registrar.clone();
        let applicant_id = handle.applicant_id.clone();
        tokio::spawn(async move {
            if let Err(e) = registrar.init_profile(&applicant_id, &contact).await {
                warn!(applicant_id = %applicant_id, "Failed to initialise applicant profile: {}", e);
            }
        });

        Ok(ActionOutput::patch(
            AnswerPatch::new()
                .with(reserved::APPLICATION_ID, handle.application_id)
                .with(reserved::APPLICANT_ID, handle.applicant_id)
                .with(reserved::TENANT_ID, handle.tenant_id)
                .with(reserved::EXTERNAL_REF, handle.external_ref),
        ))
    }

    async fn login(&self, ctx: &ActionContext<'_>, email: &str) -> Result<ActionOutput, FlowError> {
        let password = ctx
            .answers
            .get(keys::PASSWORD)
            .and_then(AnswerValue::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FlowError::MissingPrerequisite {
                step: step_ids::ACCOUNT.to_string(),
                field: keys::PASSWORD.to_string(),
            })?;

        let session = ctx.services.registrar.authenticate(email, password).await?;

        let mut patch = AnswerPatch::new();
        if !ctx.answers.has(reserved::APPLICATION_ID) {
            if let Some(id) = &session.application_id {
                patch.set(reserved::APPLICATION_ID, id.as_str());
            }
            if let Some(id) = &session.applicant_id {
                patch.set(reserved::APPLICANT_ID, id.as_str());
            }
        }
        info!("Returning applicant signed in");

        Ok(ActionOutput {
            patch,
            session: Some(session),
        })
    }
}

#[async_trait]
impl TransitionAction for AccountAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, FlowError> {
        let email = required_text(ctx.answers, step_ids::ACCOUNT, keys::EMAIL)?;
        match ctx.answers.text(keys::AUTH_MODE) {
            Some(auth_modes::LOGIN) => self.login(&ctx, email).await,
            _ => self.create(&ctx, email).await,
        }
    }
}

/// Uploads both sides of the identity document for in-scope jurisdictions.
pub struct IdentityAction;

fn staged<'a>(answers: &'a AnswerStore, field: &str, label: &str) -> Result<&'a StagedFile, FlowError> {
    answers
        .get(field)
        .and_then(AnswerValue::as_file)
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| FlowError::MissingDocument {
            field: field.to_string(),
            label: label.to_string(),
        })
}

#[async_trait]
impl TransitionAction for IdentityAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, FlowError> {
        let answers = ctx.answers;
        let in_scope = answers
            .text(keys::COUNTRY)
            .is_some_and(|c| ctx.config.requires_identity_check(c));
        if !in_scope {
            debug!("Identity verification not required for this jurisdiction");
            return Ok(ActionOutput::default());
        }
        if answers.has(reserved::ID_FRONT_DOCUMENT) && answers.has(reserved::ID_BACK_DOCUMENT) {
            debug!("Identity documents already uploaded, skipping");
            return Ok(ActionOutput::default());
        }

        let application_id = required_text(answers, step_ids::IDENTITY, reserved::APPLICATION_ID)?;
        let applicant_id = required_text(answers, step_ids::IDENTITY, reserved::APPLICANT_ID)?;
        let front = staged(answers, keys::ID_FRONT_FILE, "front of your identity document")?;
        let back = staged(answers, keys::ID_BACK_FILE, "back of your identity document")?;

        let document_type = answers.text(keys::ID_DOCUMENT_TYPE).unwrap_or("identity_document");
        let metadata = |side: &str| DocumentMetadata {
            application_id: application_id.to_string(),
            document_type: format!("{document_type}_{side}"),
            applicant_id: Some(applicant_id.to_string()),
        };
        let (front_meta, back_meta) = (metadata("front"), metadata("back"));

        let (front_receipt, back_receipt) = try_join(
            ctx.services.intake.upload(front, &front_meta),
            ctx.services.intake.upload(back, &back_meta),
        )
        .await?;

        info!(application_id, "Identity documents uploaded");

        let mut patch = AnswerPatch::new();
        for (key, file, meta, receipt) in [
            (reserved::ID_FRONT_DOCUMENT, front, &front_meta, &front_receipt),
            (reserved::ID_BACK_DOCUMENT, back, &back_meta, &back_receipt),
        ] {
            patch.set(
                key,
                DocumentRef {
                    document_id: receipt.document_id.clone(),
                    document_type: meta.document_type.clone(),
                    file_name: Some(file.file_name.clone()),
                },
            );
        }

        for fields in [&front_receipt.extracted_fields, &back_receipt.extracted_fields]
            .into_iter()
            .flatten()
        {
            for (key, value) in fields {
                if EXTRACTABLE_FIELDS.contains(&key.as_str()) && !answers.has(key) {
                    patch.set(key.as_str(), AnswerValue::from_json(value.clone()));
                }
            }
        }

        Ok(ActionOutput::patch(patch))
    }
}

/// Sends the classification answers to the risk resolver.
pub struct ClassificationAction;

#[async_trait]
impl TransitionAction for ClassificationAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, FlowError> {
        let answers = ctx.answers;
        let application_id =
            required_text(answers, step_ids::BUSINESS_CLASSIFICATION, reserved::APPLICATION_ID)?;

        let questions = RiskQuestions {
            ownership_structure: answers
                .text(keys::OWNERSHIP_STRUCTURE)
                .unwrap_or_default()
                .to_string(),
            holds_client_assets: answers.is_checked(keys::HOLDS_CLIENT_ASSETS),
            uses_intermediaries: answers.is_checked(keys::USES_INTERMEDIARIES),
            intermediary_details: answers.text(keys::INTERMEDIARY_DETAILS).map(str::to_string),
        };

        let resolution = ctx.services.risk.resolve(application_id, &questions).await?;
        let raw = serde_json::to_value(&resolution).map_err(|e| RemoteError::InvalidResponse {
            service: "risk".into(),
            reason: e.to_string(),
        })?;

        let variant = if resolution.low_risk {
            flow_variants::BASIC
        } else {
            flow_variants::ADVANCED
        };
        info!(
            application_id,
            low_risk = resolution.low_risk,
            monitoring = %resolution.monitoring_level,
            "Risk resolved"
        );

        Ok(ActionOutput::patch(
            AnswerPatch::new()
                .with(reserved::RISK_RESOLUTION, AnswerValue::from_json(raw))
                .with(reserved::LOW_RISK, resolution.low_risk)
                .with(reserved::FLOW_VARIANT, variant)
                .with(reserved::MONITORING_LEVEL, resolution.monitoring_level)
                .with(
                    reserved::REQUIRED_DOCUMENT_SETS,
                    AnswerValue::List(resolution.required_document_sets),
                ),
        ))
    }
}
