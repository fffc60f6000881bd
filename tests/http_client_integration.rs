//! `HttpCaseClient` against a stub case-management API served by Axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

use kyc_onboard::answers::StagedFile;
use kyc_onboard::error::RemoteError;
use kyc_onboard::services::{
    AccountType, ApplicationRegistrar, ContactInfo, DocumentIntake, DocumentMetadata, DraftRecord,
    DraftStore, EvidenceAggregator, HttpCaseClient, RiskQuestions, RiskResolver, SubmissionSink,
};

#[derive(Clone, Default)]
struct Backend {
    drafts: Arc<Mutex<HashMap<String, Value>>>,
    submissions: Arc<Mutex<Vec<(String, Option<String>)>>>,
    uploads: Arc<Mutex<Vec<String>>>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn create_application(Json(body): Json<Value>) -> impl IntoResponse {
    if body["contact"]["email"] == "taken@example.com" {
        return (StatusCode::CONFLICT, Json(json!({ "error": "exists" })));
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "application_id": "app-1",
            "applicant_id": "applicant-1",
            "tenant_id": "tenant-1",
            "external_ref": "KYC-0001",
        })),
    )
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != "correct-horse" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad credentials" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "token": "session-token", "application_id": "app-9" })),
    )
}

async fn put_draft(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    backend.drafts.lock().unwrap().insert(id, body);
    StatusCode::NO_CONTENT
}

async fn get_draft(State(backend): State<Backend>, Path(id): Path<String>) -> impl IntoResponse {
    match backend.drafts.lock().unwrap().get(&id) {
        Some(draft) => (StatusCode::OK, Json(draft.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "no draft" }))),
    }
}

async fn upload(State(backend): State<Backend>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(json!({})));
    }
    backend
        .uploads
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&body).into_owned());
    (
        StatusCode::CREATED,
        Json(json!({
            "document_id": "doc-1",
            "extracted_fields": { "date_of_birth": "1815-12-10" },
        })),
    )
}

async fn resolve(Json(body): Json<Value>) -> Json<Value> {
    let low_risk = body["ownership_structure"] == "direct" && body["uses_intermediaries"] == false;
    Json(json!({
        "low_risk": low_risk,
        "required_document_sets": ["corporate_identity"],
        "monitoring_level": if low_risk { "standard" } else { "enhanced" },
    }))
}

async fn evidence_summary(Path(id): Path<String>) -> impl IntoResponse {
    if id == "app-broken" {
        return (StatusCode::OK, Json(json!("not an object")));
    }
    (
        StatusCode::OK,
        Json(json!({
            "required_document_types": ["proof_of_address"],
            "missing_document_types": ["proof_of_address"],
        })),
    )
}

async fn submit(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    let key = header_value(&headers, "idempotency-key");
    let auth = header_value(&headers, header::AUTHORIZATION.as_str());
    backend.submissions.lock().unwrap().push((format!("{id}:{}", key.unwrap_or_default()), auth));
    StatusCode::ACCEPTED
}

async fn start_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/applications", post(create_application))
        .route("/auth/login", post(login))
        .route("/applications/{id}/draft", get(get_draft).put(put_draft))
        .route("/applications/{id}/documents", post(upload))
        .route("/applications/{id}/risk/resolve", post(resolve))
        .route("/applications/{id}/evidence-summary", get(evidence_summary))
        .route("/applications/{id}/submit", post(submit))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Trailing slash is trimmed by the client.
    (format!("http://127.0.0.1:{port}/"), backend)
}

fn client(base: &str) -> HttpCaseClient {
    HttpCaseClient::new(base, Some(SecretString::from("api-key")), Duration::from_secs(5)).unwrap()
}

fn contact(email: &str) -> ContactInfo {
    ContactInfo {
        email: email.into(),
        first_name: Some("Ada".into()),
        last_name: None,
    }
}

#[tokio::test]
async fn create_application_and_conflict() {
    let (base, _) = start_backend().await;
    let client = client(&base);

    let handle = client
        .create_application(AccountType::Individual, &contact("ada@example.com"))
        .await
        .unwrap();
    assert_eq!(handle.application_id, "app-1");
    assert_eq!(handle.external_ref, "KYC-0001");

    let err = client
        .create_application(AccountType::Business, &contact("taken@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::AccountExists { ref email } if email == "taken@example.com"));
}

#[tokio::test]
async fn authenticate_maps_unauthorized() {
    let (base, _) = start_backend().await;
    let client = client(&base);

    let session = client.authenticate("ada@example.com", "correct-horse").await.unwrap();
    assert_eq!(session.token.expose_secret(), "session-token");
    assert_eq!(session.application_id.as_deref(), Some("app-9"));
    assert_eq!(session.applicant_id, None);

    let err = client.authenticate("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized { .. }));
}

#[tokio::test]
async fn draft_round_trip_and_missing_draft() {
    let (base, _) = start_backend().await;
    let client = client(&base);

    assert_eq!(client.load_draft("app-1").await.unwrap(), None);

    let mut draft_answers = serde_json::Map::new();
    draft_answers.insert("a".into(), json!(1));
    let draft = DraftRecord {
        current_step_id: "contact".into(),
        draft_answers,
    };
    client.save_draft("app-1", &draft).await.unwrap();
    assert_eq!(client.load_draft("app-1").await.unwrap(), Some(draft));
}

#[tokio::test]
async fn upload_sends_multipart_form() {
    let (base, backend) = start_backend().await;
    let client = client(&base);

    let file = StagedFile::new("front.png", "image/png", b"png-bytes".to_vec());
    let metadata = DocumentMetadata {
        application_id: "app-1".into(),
        document_type: "passport_front".into(),
        applicant_id: Some("applicant-1".into()),
    };
    let receipt = client.upload(&file, &metadata).await.unwrap();
    assert_eq!(receipt.document_id, "doc-1");
    assert_eq!(receipt.extracted_fields.unwrap()["date_of_birth"], "1815-12-10");

    let uploads = backend.uploads.lock().unwrap();
    assert!(uploads[0].contains("passport_front"));
    assert!(uploads[0].contains("front.png"));
    assert!(uploads[0].contains("png-bytes"));
}

#[tokio::test]
async fn resolve_and_evidence() {
    let (base, _) = start_backend().await;
    let client = client(&base);

    let resolution = client
        .resolve(
            "app-1",
            &RiskQuestions {
                ownership_structure: "direct".into(),
                holds_client_assets: false,
                uses_intermediaries: false,
                intermediary_details: None,
            },
        )
        .await
        .unwrap();
    assert!(resolution.low_risk);
    assert_eq!(resolution.monitoring_level, "standard");

    let summary = client.fetch_summary("app-1").await.unwrap();
    assert!(!summary.is_complete());
    assert!(summary.document_sets.is_empty());

    let err = client.fetch_summary("app-broken").await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse { .. }));
}

#[tokio::test]
async fn submit_carries_idempotency_key_and_auth() {
    let (base, backend) = start_backend().await;
    let client = client(&base);

    let key = Uuid::new_v4();
    client.submit("app-1", &serde_json::Map::new(), key).await.unwrap();

    let submissions = backend.submissions.lock().unwrap();
    assert_eq!(submissions[0].0, format!("app-1:{key}"));
    assert_eq!(submissions[0].1.as_deref(), Some("Bearer api-key"));
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client(&format!("http://127.0.0.1:{port}"));
    let err = client.fetch_summary("app-1").await.unwrap_err();
    assert!(matches!(err, RemoteError::Request { .. }));
}
