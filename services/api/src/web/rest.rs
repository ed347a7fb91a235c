//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use interview_core::domain::{ReportChunk, ReportStatus, Turn};
use interview_core::ports::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_session_handler,
        get_current_question_handler,
        submit_answer_handler,
        start_report_handler,
        read_report_handler,
    ),
    components(
        schemas(
            StartSessionRequest,
            StartSessionResponse,
            SubmitAnswerRequest,
            SubmitAnswerResponse,
            StartReportResponse,
            ReadReportResponse,
        )
    ),
    tags(
        (name = "Interview Engine API", description = "API endpoints for the mock-interview session engine.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The request payload for starting a new interview session.
#[derive(Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub user_id: Uuid,
    pub resume_ref: String,
    pub job_type_ref: String,
    #[serde(default = "default_persona")]
    pub persona: String,
    pub session_seconds: i64,
}

fn default_persona() -> String {
    "neutral".to_string()
}

/// The response payload sent after successfully starting a session.
#[derive(Serialize, ToSchema)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
}

/// The request payload for submitting an answer to the current question.
#[derive(Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub answer_text: String,
    pub answer_duration_seconds: u64,
    #[serde(default)]
    pub persona_override: Option<String>,
}

/// The response payload for a scored answer.
#[derive(Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    #[schema(value_type = Object)]
    pub scored_turn: Turn,
    #[schema(value_type = Option<Object>)]
    pub next_turn: Option<Turn>,
    pub completed: bool,
    pub stop_reason: Option<String>,
}

/// The response payload sent after scheduling a report.
#[derive(Serialize, ToSchema)]
pub struct StartReportResponse {
    pub report_id: Uuid,
}

/// Query parameters for incremental report reads.
#[derive(Deserialize)]
pub struct ReadReportQuery {
    /// Highest chunk index the client has already seen; -1 for "from the
    /// beginning".
    #[serde(default = "default_after")]
    pub after: i64,
}

fn default_after() -> i64 {
    -1
}

/// One incremental slice of a report.
#[derive(Serialize, ToSchema)]
pub struct ReadReportResponse {
    #[schema(value_type = Vec<Object>)]
    pub chunks: Vec<ReportChunk>,
    pub completed: bool,
    #[schema(value_type = String)]
    pub status: ReportStatus,
    pub error_message: Option<String>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps the engine's error taxonomy onto HTTP statuses. Callers can always
/// tell "bad request" (400) from "unknown/expired" (404) from "stale or
/// conflicting state" (409).
fn into_response_error(err: EngineError) -> (StatusCode, String) {
    let status = match &err {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::StateConflict(_) => StatusCode::CONFLICT,
        EngineError::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
        EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start a new interview session.
///
/// Returns immediately with the new session id; the first question is
/// generated in the background and fetched via the question endpoint.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Invalid session parameters")
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session_id = app_state
        .engine
        .start_session(
            payload.user_id,
            &payload.resume_ref,
            &payload.job_type_ref,
            &payload.persona,
            payload.session_seconds,
        )
        .await
        .map_err(into_response_error)?;
    Ok((StatusCode::CREATED, Json(StartSessionResponse { session_id })))
}

/// Fetch the current unanswered question for a session.
///
/// Falls back to synchronous generation if the background task has not
/// produced the question yet, so latency stays bounded.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/question",
    responses(
        (status = 200, description = "The current unanswered turn"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already finished")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session identifier.")
    )
)]
pub async fn get_current_question_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let turn = app_state
        .engine
        .get_current_question(session_id)
        .await
        .map_err(into_response_error)?;
    Ok(Json(turn))
}

/// Submit the answer to the current question.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/answers",
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = SubmitAnswerResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "No outstanding question or session finished")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session identifier.")
    )
)]
pub async fn submit_answer_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .engine
        .submit_answer(
            session_id,
            &payload.answer_text,
            payload.answer_duration_seconds,
            payload.persona_override.as_deref(),
        )
        .await
        .map_err(into_response_error)?;
    Ok(Json(SubmitAnswerResponse {
        scored_turn: outcome.scored_turn,
        next_turn: outcome.next_turn,
        completed: outcome.completed,
        stop_reason: outcome.stop_reason,
    }))
}

/// Schedule growth-report generation for a session.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/report",
    responses(
        (status = 202, description = "Report generation started", body = StartReportResponse),
        (status = 404, description = "Unknown session")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session identifier.")
    )
)]
pub async fn start_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report_id = app_state
        .engine
        .start_report(session_id)
        .await
        .map_err(into_response_error)?;
    Ok((StatusCode::ACCEPTED, Json(StartReportResponse { report_id })))
}

/// Read report chunks after the given index.
///
/// Designed for repeated short-interval polling: idempotent and
/// side-effect-free apart from refreshing the record's TTL. A 404 means
/// the report is unknown or expired, not that generation failed.
#[utoipa::path(
    get,
    path = "/reports/{report_id}",
    responses(
        (status = 200, description = "Incremental report slice", body = ReadReportResponse),
        (status = 404, description = "Unknown or expired report")
    ),
    params(
        ("report_id" = Uuid, Path, description = "The report identifier."),
        ("after" = i64, Query, description = "Highest chunk index already seen; -1 for all.")
    )
)]
pub async fn read_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
    Query(query): Query<ReadReportQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = app_state
        .engine
        .read_report(report_id, query.after)
        .await
        .map_err(into_response_error)?;
    Ok(Json(ReadReportResponse {
        chunks: view.chunks,
        completed: view.completed,
        status: view.status,
        error_message: view.error_message,
    }))
}
