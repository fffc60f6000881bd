//! HTTP client for the case-management service.
//!
//! One `reqwest::Client` backs every collaborator trait. Timeouts are set on
//! the client; callers see them as `RemoteError::Request`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::{
    AccountType, ApplicationHandle, ApplicationRegistrar, ContactInfo, DocumentIntake,
    DocumentMetadata, DraftRecord, DraftStore, EvidenceAggregator, EvidenceSummary, RiskQuestions,
    RiskResolution, RiskResolver, Session, SubmissionSink, UploadReceipt,
};
use crate::answers::StagedFile;
use crate::config::PortalConfig;
use crate::error::RemoteError;

/// Case-management API client.
pub struct HttpCaseClient {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    application_id: Option<String>,
    #[serde(default)]
    applicant_id: Option<String>,
}

impl HttpCaseClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Request {
                service: "http".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self, RemoteError> {
        Self::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn send(
        &self,
        service: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let resp = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| RemoteError::Request {
                service: service.to_string(),
                reason: e.to_string(),
            })?;
        debug!(service, status = %resp.status(), "Case API response");
        Ok(resp)
    }

    /// Turn a non-success response into an error.
    async fn check(service: &str, resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthorized {
                service: service.to_string(),
            });
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            service: service.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(service: &str, resp: reqwest::Response) -> Result<T, RemoteError> {
        resp.json::<T>().await.map_err(|e| RemoteError::InvalidResponse {
            service: service.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ApplicationRegistrar for HttpCaseClient {
    async fn create_application(
        &self,
        account_type: AccountType,
        contact: &ContactInfo,
    ) -> Result<ApplicationHandle, RemoteError> {
        let service = "registrar";
        let body = serde_json::json!({
            "account_type": account_type,
            "contact": contact,
        });
        let resp = self
            .send(service, self.client.post(self.url("/applications")).json(&body))
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(RemoteError::AccountExists {
                email: contact.email.clone(),
            });
        }
        let resp = Self::check(service, resp).await?;
        Self::json(service, resp).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        let service = "auth";
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .send(service, self.client.post(self.url("/auth/login")).json(&body))
            .await?;
        let resp = Self::check(service, resp).await?;
        let login: LoginResponse = Self::json(service, resp).await?;
        Ok(Session {
            token: SecretString::from(login.token),
            application_id: login.application_id,
            applicant_id: login.applicant_id,
        })
    }

    async fn init_profile(&self, applicant_id: &str, contact: &ContactInfo) -> Result<(), RemoteError> {
        let service = "profile";
        let resp = self
            .send(
                service,
                self.client
                    .post(self.url(&format!("/applicants/{applicant_id}/profile")))
                    .json(contact),
            )
            .await?;
        Self::check(service, resp).await?;
        Ok(())
    }
}

#[async_trait]
impl DraftStore for HttpCaseClient {
    async fn save_draft(&self, application_id: &str, draft: &DraftRecord) -> Result<(), RemoteError> {
        let service = "drafts";
        let resp = self
            .send(
                service,
                self.client
                    .put(self.url(&format!("/applications/{application_id}/draft")))
                    .json(draft),
            )
            .await?;
        Self::check(service, resp).await?;
        Ok(())
    }

    async fn load_draft(&self, application_id: &str) -> Result<Option<DraftRecord>, RemoteError> {
        let service = "drafts";
        let resp = self
            .send(
                service,
                self.client
                    .get(self.url(&format!("/applications/{application_id}/draft"))),
            )
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(service, resp).await?;
        Self::json(service, resp).await.map(Some)
    }
}

#[async_trait]
impl DocumentIntake for HttpCaseClient {
    async fn upload(&self, file: &StagedFile, metadata: &DocumentMetadata) -> Result<UploadReceipt, RemoteError> {
        let service = "documents";
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| RemoteError::Request {
                service: service.to_string(),
                reason: format!("invalid content type {}: {e}", file.content_type),
            })?;

        let mut form = Form::new()
            .part("file", part)
            .text("document_type", metadata.document_type.clone());
        if let Some(applicant_id) = &metadata.applicant_id {
            form = form.text("applicant_id", applicant_id.clone());
        }

        let resp = self
            .send(
                service,
                self.client
                    .post(self.url(&format!("/applications/{}/documents", metadata.application_id)))
                    .multipart(form),
            )
            .await?;
        let resp = Self::check(service, resp).await?;
        Self::json(service, resp).await
    }
}

#[async_trait]
impl RiskResolver for HttpCaseClient {
    async fn resolve(&self, application_id: &str, questions: &RiskQuestions) -> Result<RiskResolution, RemoteError> {
        let service = "risk";
        let resp = self
            .send(
                service,
                self.client
                    .post(self.url(&format!("/applications/{application_id}/risk/resolve")))
                    .json(questions),
            )
            .await?;
        let resp = Self::check(service, resp).await?;
        Self::json(service, resp).await
    }
}

#[async_trait]
impl EvidenceAggregator for HttpCaseClient {
    async fn fetch_summary(&self, application_id: &str) -> Result<EvidenceSummary, RemoteError> {
        let service = "evidence";
        let resp = self
            .send(
                service,
                self.client
                    .get(self.url(&format!("/applications/{application_id}/evidence-summary"))),
            )
            .await?;
        let resp = Self::check(service, resp).await?;
        Self::json(service, resp).await
    }
}

#[async_trait]
impl SubmissionSink for HttpCaseClient {
    async fn submit(
        &self,
        application_id: &str,
        answers: &serde_json::Map<String, serde_json::Value>,
        idempotency_key: Uuid,
    ) -> Result<(), RemoteError> {
        let service = "submission";
        let resp = self
            .send(
                service,
                self.client
                    .post(self.url(&format!("/applications/{application_id}/submit")))
                    .header("Idempotency-Key", idempotency_key.to_string())
                    .json(&serde_json::json!({ "answers": answers })),
            )
            .await?;
        Self::check(service, resp).await?;
        Ok(())
    }
}
