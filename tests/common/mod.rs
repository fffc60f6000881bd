//! Shared stubs for the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use uuid::Uuid;

use kyc_onboard::answers::StagedFile;
use kyc_onboard::answers::keys;
use kyc_onboard::config::FlowConfig;
use kyc_onboard::error::RemoteError;
use kyc_onboard::onboarding::{FlowController, kyc_step_graph};
use kyc_onboard::services::{
    AccountType, ApplicationHandle, ApplicationRegistrar, Collaborators, ContactInfo,
    DocumentIntake, DocumentMetadata, DraftRecord, DraftStore, EvidenceAggregator,
    EvidenceSummary, RiskQuestions, RiskResolution, RiskResolver, Session, SubmissionSink,
    UploadReceipt,
};
use kyc_onboard::store::MemoryMirror;

/// Case-management backend kept in memory. Every call is counted.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<&'static str>>,
    drafts: Mutex<HashMap<String, DraftRecord>>,
    pub account_exists: AtomicBool,
    pub fail_evidence: AtomicBool,
    pub fail_submit: AtomicBool,
    pub low_risk: AtomicBool,
    pub missing_documents: Mutex<Vec<String>>,
    pub submit_keys: Mutex<Vec<Uuid>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            registrar: self.clone(),
            drafts: self.clone(),
            intake: self.clone(),
            risk: self.clone(),
            evidence: self.clone(),
            submission: self.clone(),
        }
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn draft(&self, application_id: &str) -> Option<DraftRecord> {
        self.drafts.lock().unwrap().get(application_id).cloned()
    }

    pub fn seed_draft(&self, application_id: &str, draft: DraftRecord) {
        self.drafts.lock().unwrap().insert(application_id.to_string(), draft);
    }

    pub fn set_missing(&self, missing: &[&str]) {
        *self.missing_documents.lock().unwrap() = missing.iter().map(|s| s.to_string()).collect();
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl ApplicationRegistrar for FakeBackend {
    async fn create_application(
        &self,
        _account_type: AccountType,
        contact: &ContactInfo,
    ) -> Result<ApplicationHandle, RemoteError> {
        self.record("create_application");
        if self.account_exists.load(Ordering::SeqCst) {
            return Err(RemoteError::AccountExists {
                email: contact.email.clone(),
            });
        }
        Ok(ApplicationHandle {
            application_id: "app-42".into(),
            applicant_id: "applicant-42".into(),
            tenant_id: "tenant-1".into(),
            external_ref: "KYC-0042".into(),
        })
    }

    async fn authenticate(&self, _email: &str, _password: &str) -> Result<Session, RemoteError> {
        self.record("authenticate");
        Ok(Session {
            token: SecretString::from("token"),
            application_id: Some("app-42".into()),
            applicant_id: Some("applicant-42".into()),
        })
    }

    async fn init_profile(&self, _applicant_id: &str, _contact: &ContactInfo) -> Result<(), RemoteError> {
        self.record("init_profile");
        Err(RemoteError::Request {
            service: "profile".into(),
            reason: "profile service unavailable".into(),
        })
    }
}

#[async_trait]
impl DraftStore for FakeBackend {
    async fn save_draft(&self, application_id: &str, draft: &DraftRecord) -> Result<(), RemoteError> {
        self.record("save_draft");
        self.seed_draft(application_id, draft.clone());
        Ok(())
    }

    async fn load_draft(&self, application_id: &str) -> Result<Option<DraftRecord>, RemoteError> {
        self.record("load_draft");
        Ok(self.draft(application_id))
    }
}

#[async_trait]
impl DocumentIntake for FakeBackend {
    async fn upload(&self, _file: &StagedFile, metadata: &DocumentMetadata) -> Result<UploadReceipt, RemoteError> {
        self.record("upload");
        Ok(UploadReceipt {
            document_id: format!("doc-{}", metadata.document_type),
            extracted_fields: None,
        })
    }
}

#[async_trait]
impl RiskResolver for FakeBackend {
    async fn resolve(&self, _application_id: &str, _questions: &RiskQuestions) -> Result<RiskResolution, RemoteError> {
        self.record("resolve");
        let low_risk = self.low_risk.load(Ordering::SeqCst);
        Ok(RiskResolution {
            low_risk,
            required_document_sets: vec!["corporate_identity".into()],
            monitoring_level: "standard".into(),
        })
    }
}

#[async_trait]
impl EvidenceAggregator for FakeBackend {
    async fn fetch_summary(&self, _application_id: &str) -> Result<EvidenceSummary, RemoteError> {
        self.record("fetch_summary");
        if self.fail_evidence.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                service: "evidence".into(),
                status: 503,
                body: "busy".into(),
            });
        }
        Ok(EvidenceSummary {
            required_document_types: vec!["certificate_of_incorporation".into()],
            missing_document_types: self.missing_documents.lock().unwrap().clone(),
            document_sets: vec![],
            generated_at: Some(chrono::Utc::now()),
        })
    }
}

#[async_trait]
impl SubmissionSink for FakeBackend {
    async fn submit(
        &self,
        _application_id: &str,
        _answers: &serde_json::Map<String, serde_json::Value>,
        idempotency_key: Uuid,
    ) -> Result<(), RemoteError> {
        self.record("submit");
        self.submit_keys.lock().unwrap().push(idempotency_key);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                service: "submission".into(),
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(())
    }
}

pub fn controller(backend: &Arc<FakeBackend>) -> FlowController {
    controller_with(backend, FlowConfig::default())
}

pub fn controller_with(backend: &Arc<FakeBackend>, config: FlowConfig) -> FlowController {
    FlowController::new(
        kyc_step_graph().unwrap(),
        backend.collaborators(),
        Arc::new(MemoryMirror::new()),
        config,
    )
}

/// Fill the account step for a new applicant of `account_type`.
pub async fn fill_account(c: &FlowController, account_type: &str) {
    c.set_answer(keys::ACCOUNT_TYPE, account_type).await.unwrap();
    c.set_answer(keys::EMAIL, "ada@example.com").await.unwrap();
    c.set_answer(keys::PASSWORD, "analytical-engine").await.unwrap();
}

/// Fill the contact step. Country `FR` keeps identity verification out of scope.
pub async fn fill_contact(c: &FlowController, country: &str) {
    c.set_answer(keys::FIRST_NAME, "Ada").await.unwrap();
    c.set_answer(keys::LAST_NAME, "Lovelace").await.unwrap();
    c.set_answer(keys::PHONE, "+44 20 7946 0000").await.unwrap();
    c.set_answer(keys::COUNTRY, country).await.unwrap();
}

pub async fn fill_identity(c: &FlowController) {
    c.set_answer(keys::ID_DOCUMENT_TYPE, "passport").await.unwrap();
    c.set_answer(keys::ID_NUMBER, "123456789").await.unwrap();
}

pub async fn check_declarations(c: &FlowController, business: bool) {
    c.set_answer(keys::DECLARATION_ACCURATE, true).await.unwrap();
    c.set_answer(keys::DECLARATION_TERMS, true).await.unwrap();
    c.set_answer(keys::DECLARATION_PRIVACY, true).await.unwrap();
    if business {
        c.set_answer(keys::DECLARATION_AUTHORISED_SIGNATORY, true).await.unwrap();
        c.set_answer(keys::DECLARATION_BENEFICIAL_OWNERS, true).await.unwrap();
    }
}

pub async fn current(c: &FlowController) -> &'static str {
    c.current_step().await.map(|s| s.id).unwrap_or_default()
}
