//! Remote collaborators consumed by the flow engine.
//!
//! Each concern is a separate trait so tests can stub any one of them;
//! `HttpCaseClient` implements them all against the case-management API.

pub mod http;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answers::StagedFile;
use crate::error::RemoteError;

pub use http::HttpCaseClient;

/// Applicant category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Individual,
    Business,
}

impl AccountType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "individual" => Some(Self::Individual),
            "business" => Some(Self::Business),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Business => write!(f, "business"),
        }
    }
}

/// Contact details sent when creating an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Identifiers issued by the registrar for a new application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationHandle {
    pub application_id: String,
    pub applicant_id: String,
    pub tenant_id: String,
    pub external_ref: String,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
    /// The applicant's in-flight application, if the server knows one.
    pub application_id: Option<String>,
    pub applicant_id: Option<String>,
}

/// Durable remote snapshot used for resumption. Overwritten on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub current_step_id: String,
    pub draft_answers: serde_json::Map<String, serde_json::Value>,
}

/// Metadata attached to an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub application_id: String,
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<String>,
}

/// Result of a document upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub document_id: String,
    /// Values read off the document (e.g. date of birth). Never required.
    #[serde(default)]
    pub extracted_fields: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Ownership/custody/intermediation answers sent to the risk resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskQuestions {
    pub ownership_structure: String,
    pub holds_client_assets: bool,
    pub uses_intermediaries: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediary_details: Option<String>,
}

/// Risk classification returned by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResolution {
    pub low_risk: bool,
    #[serde(default)]
    pub required_document_sets: Vec<String>,
    pub monitoring_level: String,
}

/// A group of documents that together satisfy one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub name: String,
    #[serde(default)]
    pub document_types: Vec<String>,
    #[serde(default)]
    pub satisfied: bool,
}

/// Externally computed evidence completeness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    #[serde(default)]
    pub required_document_types: Vec<String>,
    /// Required on the wire; an absent list must not read as "nothing missing".
    pub missing_document_types: Vec<String>,
    #[serde(default)]
    pub document_sets: Vec<DocumentSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl EvidenceSummary {
    pub fn is_complete(&self) -> bool {
        self.missing_document_types.is_empty()
    }
}

/// Creates applications and authenticates returning applicants.
#[async_trait]
pub trait ApplicationRegistrar: Send + Sync {
    async fn create_application(
        &self,
        account_type: AccountType,
        contact: &ContactInfo,
    ) -> Result<ApplicationHandle, RemoteError>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, RemoteError>;

    /// Pre-create the applicant profile record. Callers treat this as best effort.
    async fn init_profile(&self, applicant_id: &str, contact: &ContactInfo) -> Result<(), RemoteError>;
}

/// Remote draft persistence keyed by application id.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, application_id: &str, draft: &DraftRecord) -> Result<(), RemoteError>;

    async fn load_draft(&self, application_id: &str) -> Result<Option<DraftRecord>, RemoteError>;
}

/// Document upload and extraction.
#[async_trait]
pub trait DocumentIntake: Send + Sync {
    async fn upload(&self, file: &StagedFile, metadata: &DocumentMetadata) -> Result<UploadReceipt, RemoteError>;
}

/// Risk classification for business applicants.
#[async_trait]
pub trait RiskResolver: Send + Sync {
    async fn resolve(&self, application_id: &str, questions: &RiskQuestions) -> Result<RiskResolution, RemoteError>;
}

/// Evidence completeness reporting.
#[async_trait]
pub trait EvidenceAggregator: Send + Sync {
    async fn fetch_summary(&self, application_id: &str) -> Result<EvidenceSummary, RemoteError>;
}

/// Final application submission.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(
        &self,
        application_id: &str,
        answers: &serde_json::Map<String, serde_json::Value>,
        idempotency_key: Uuid,
    ) -> Result<(), RemoteError>;
}

/// The full set of collaborators handed to the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub registrar: Arc<dyn ApplicationRegistrar>,
    pub drafts: Arc<dyn DraftStore>,
    pub intake: Arc<dyn DocumentIntake>,
    pub risk: Arc<dyn RiskResolver>,
    pub evidence: Arc<dyn EvidenceAggregator>,
    pub submission: Arc<dyn SubmissionSink>,
}

impl Collaborators {
    /// Route every concern through one HTTP client.
    pub fn http(client: Arc<HttpCaseClient>) -> Self {
        Self {
            registrar: client.clone(),
            drafts: client.clone(),
            intake: client.clone(),
            risk: client.clone(),
            evidence: client.clone(),
            submission: client,
        }
    }
}
