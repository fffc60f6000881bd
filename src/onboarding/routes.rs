//! REST endpoints over the flow controller.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::answers::{AnswerValue, StagedFile};
use crate::error::FlowError;

use super::controller::FlowController;

/// Uploads larger than this are rejected before reaching the controller.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub controller: Arc<FlowController>,
}

/// Flow errors rendered as `{error, status}` JSON.
pub struct ApiError(FlowError);

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            FlowError::Busy | FlowError::AccountExists { .. } | FlowError::AlreadySubmitted => {
                StatusCode::CONFLICT
            }
            FlowError::UnknownField { .. } | FlowError::ReadOnlyField { .. } | FlowError::UnknownStep { .. } => {
                StatusCode::BAD_REQUEST
            }
            FlowError::DraftNotFound { .. } => StatusCode::NOT_FOUND,
            FlowError::Storage(_) | FlowError::InvalidGraph(_) => StatusCode::INTERNAL_SERVER_ERROR,
            e if e.is_remote() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn staged_file(fallback_name: &str, headers: &HeaderMap, body: Bytes) -> StagedFile {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    StagedFile::new(
        header_str("x-file-name").unwrap_or(fallback_name),
        header_str(header::CONTENT_TYPE.as_str()).unwrap_or("application/octet-stream"),
        body.to_vec(),
    )
}

// ── Reads ───────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kyc-onboard"
    }))
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.controller.snapshot().await)
}

/// GET /api/onboarding/steps
async fn get_steps(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.controller.visible_steps().await)
}

/// GET /api/onboarding/step
///
/// The current step plus what a renderer needs to paint it.
async fn get_step(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let c = &state.controller;
    Json(serde_json::json!({
        "step": c.current_step().await,
        "visible_index": c.visible_index().await,
        "show_validation_errors": c.show_validation_errors().await,
        "last_error": c.last_error().await,
        "is_busy": c.is_busy(),
    }))
}

// ── Writes ──────────────────────────────────────────────────────────────

/// PUT /api/onboarding/answers
///
/// Body is a JSON object of field key to value. All-or-nothing.
async fn put_answers(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> ApiResult<impl IntoResponse> {
    state
        .controller
        .set_answers(body.into_iter().map(|(k, v)| (k, AnswerValue::from_json(v))))
        .await?;
    Ok(Json(state.controller.snapshot().await))
}

/// PUT /api/onboarding/files/{key}
async fn put_file(
    State(state): State<OnboardingRouteState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let file = staged_file(&key, &headers, body);
    state.controller.stage_file(&key, file).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/onboarding/documents/{document_type}
async fn post_document(
    State(state): State<OnboardingRouteState>,
    Path(document_type): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let file = staged_file(&document_type, &headers, body);
    let document = state.controller.attach_document(&document_type, file).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn post_next(State(state): State<OnboardingRouteState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.go_next().await?))
}

async fn post_back(State(state): State<OnboardingRouteState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.go_back().await?))
}

async fn post_save(State(state): State<OnboardingRouteState>) -> ApiResult<impl IntoResponse> {
    let outcome = state.controller.save_and_exit().await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}

async fn post_reset(State(state): State<OnboardingRouteState>) -> ApiResult<StatusCode> {
    state.controller.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_submit(State(state): State<OnboardingRouteState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.submit().await?))
}

async fn post_refresh_evidence(State(state): State<OnboardingRouteState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.refresh_evidence().await?))
}

/// POST /api/onboarding/resume/{application_id}
async fn post_resume(
    State(state): State<OnboardingRouteState>,
    Path(application_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.controller.resume(&application_id).await?;
    Ok(Json(state.controller.snapshot().await))
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/steps", get(get_steps))
        .route("/api/onboarding/step", get(get_step))
        .route("/api/onboarding/answers", put(put_answers))
        .route("/api/onboarding/files/{key}", put(put_file))
        .route("/api/onboarding/documents/{document_type}", post(post_document))
        .route("/api/onboarding/next", post(post_next))
        .route("/api/onboarding/back", post(post_back))
        .route("/api/onboarding/save", post(post_save))
        .route("/api/onboarding/reset", post(post_reset))
        .route("/api/onboarding/submit", post(post_submit))
        .route("/api/onboarding/evidence/refresh", post(post_refresh_evidence))
        .route("/api/onboarding/resume/{application_id}", post(post_resume))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
