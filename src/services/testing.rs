//! In-process stub backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use uuid::Uuid;

use super::*;
use crate::answers::StagedFile;
use crate::error::RemoteError;

/// Records every call by name; failure switches flip individual services.
#[derive(Default)]
pub struct StubBackend {
    calls: Mutex<Vec<&'static str>>,
    drafts: Mutex<HashMap<String, DraftRecord>>,
    pub account_exists: AtomicBool,
    pub fail_profile: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_drafts: AtomicBool,
    pub fail_evidence: AtomicBool,
    pub fail_submit: AtomicBool,
    pub low_risk: AtomicBool,
    pub missing_documents: Mutex<Vec<String>>,
    pub submitted_keys: Mutex<Vec<Uuid>>,
}

impl StubBackend {
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

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn draft(&self, application_id: &str) -> Option<DraftRecord> {
        self.drafts.lock().unwrap().get(application_id).cloned()
    }

    pub fn put_draft(&self, application_id: &str, draft: DraftRecord) {
        self.drafts
            .lock()
            .unwrap()
            .insert(application_id.to_string(), draft);
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn failure(&self, flag: &AtomicBool, service: &str) -> Result<(), RemoteError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RemoteError::Request {
                service: service.to_string(),
                reason: "stubbed failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationRegistrar for StubBackend {
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
            application_id: "app-1".into(),
            applicant_id: "applicant-1".into(),
            tenant_id: "tenant-1".into(),
            external_ref: "KYC-0001".into(),
        })
    }

    async fn authenticate(&self, _email: &str, password: &str) -> Result<Session, RemoteError> {
        self.record("authenticate");
        if password != "correct-horse" {
            return Err(RemoteError::Unauthorized {
                service: "auth".into(),
            });
        }
        Ok(Session {
            token: SecretString::from("session-token"),
            application_id: Some("app-9".into()),
            applicant_id: Some("applicant-9".into()),
        })
    }

    async fn init_profile(&self, _applicant_id: &str, _contact: &ContactInfo) -> Result<(), RemoteError> {
        self.record("init_profile");
        self.failure(&self.fail_profile, "profile")
    }
}

#[async_trait]
impl DraftStore for StubBackend {
    async fn save_draft(&self, application_id: &str, draft: &DraftRecord) -> Result<(), RemoteError> {
        self.record("save_draft");
        self.failure(&self.fail_drafts, "drafts")?;
        self.put_draft(application_id, draft.clone());
        Ok(())
    }

    async fn load_draft(&self, application_id: &str) -> Result<Option<DraftRecord>, RemoteError> {
        self.record("load_draft");
        self.failure(&self.fail_drafts, "drafts")?;
        Ok(self.draft(application_id))
    }
}

#[async_trait]
impl DocumentIntake for StubBackend {
    async fn upload(&self, file: &StagedFile, metadata: &DocumentMetadata) -> Result<UploadReceipt, RemoteError> {
        self.record("upload");
        self.failure(&self.fail_upload, "documents")?;
        let mut extracted = serde_json::Map::new();
        extracted.insert("date_of_birth".into(), "1815-12-10".into());
        extracted.insert("favourite_colour".into(), "green".into());
        Ok(UploadReceipt {
            document_id: format!("doc-{}-{}", metadata.document_type, file.file_name),
            extracted_fields: Some(extracted),
        })
    }
}

#[async_trait]
impl RiskResolver for StubBackend {
    async fn resolve(&self, _application_id: &str, _questions: &RiskQuestions) -> Result<RiskResolution, RemoteError> {
        self.record("resolve");
        let low_risk = self.low_risk.load(Ordering::SeqCst);
        Ok(RiskResolution {
            low_risk,
            required_document_sets: vec!["corporate_identity".into()],
            monitoring_level: if low_risk { "standard" } else { "enhanced" }.into(),
        })
    }
}

#[async_trait]
impl EvidenceAggregator for StubBackend {
    async fn fetch_summary(&self, _application_id: &str) -> Result<EvidenceSummary, RemoteError> {
        self.record("fetch_summary");
        self.failure(&self.fail_evidence, "evidence")?;
        Ok(EvidenceSummary {
            required_document_types: vec!["certificate_of_incorporation".into()],
            missing_document_types: self.missing_documents.lock().unwrap().clone(),
            document_sets: vec![],
            generated_at: None,
        })
    }
}

#[async_trait]
impl SubmissionSink for StubBackend {
    async fn submit(
        &self,
        _application_id: &str,
        _answers: &serde_json::Map<String, serde_json::Value>,
        idempotency_key: Uuid,
    ) -> Result<(), RemoteError> {
        self.record("submit");
        self.submitted_keys.lock().unwrap().push(idempotency_key);
        self.failure(&self.fail_submit, "submission")
    }
}
