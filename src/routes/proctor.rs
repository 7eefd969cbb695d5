use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use validator::Validate;

use crate::dto::proctor_dto::{
    HeartbeatResponse, LogEventRequest, LogEventResponse, SessionRef, StartSessionRequest,
    StartSessionResponse,
};
use crate::error::Result;
use crate::middleware::auth::{CandidateAuth, RecruiterAuth};
use crate::services::proctor_service::ProctorService;
use crate::utils::time::now;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    CandidateAuth(principal): CandidateAuth,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Response> {
    payload.validate()?;
    let svc = ProctorService::new(state.sessions.clone());
    let session = svc
        .start_session(principal.user_id, payload.assessment_id, now())
        .await?;

    let response = StartSessionResponse {
        success: true,
        session_id: session.id,
        message: "Proctoring session started".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[axum::debug_handler]
pub async fn end_session(
    State(state): State<AppState>,
    CandidateAuth(principal): CandidateAuth,
    Json(payload): Json<SessionRef>,
) -> Result<Response> {
    let svc = ProctorService::new(state.sessions.clone());
    let session = svc
        .end_session(payload.session_id, principal.user_id, now())
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Proctoring session ended",
            "session_id": session.id,
            "duration_minutes": session.duration_minutes(),
        })),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn heartbeat(
    State(state): State<AppState>,
    CandidateAuth(principal): CandidateAuth,
    Json(payload): Json<SessionRef>,
) -> Result<Response> {
    let svc = ProctorService::new(state.sessions.clone());
    let last_activity = svc
        .heartbeat(payload.session_id, principal.user_id, now())
        .await?;

    let response = HeartbeatResponse {
        success: true,
        is_suspended: false,
        last_activity,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[axum::debug_handler]
pub async fn log_event(
    State(state): State<AppState>,
    CandidateAuth(principal): CandidateAuth,
    Json(payload): Json<LogEventRequest>,
) -> Result<Response> {
    payload.validate()?;
    let svc = ProctorService::new(state.sessions.clone());
    let event = svc
        .log_event(
            payload.session_id,
            principal.user_id,
            &payload.event_type,
            payload.details_text(),
            now(),
        )
        .await?;

    let response = LogEventResponse {
        success: true,
        severity: event.severity,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[axum::debug_handler]
pub async fn session_summary(
    State(state): State<AppState>,
    RecruiterAuth(_): RecruiterAuth,
    Path(session_id): Path<i64>,
) -> Result<Response> {
    let svc = ProctorService::new(state.sessions.clone());
    let summary = svc.summary(session_id).await?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

#[axum::debug_handler]
pub async fn candidate_sessions(
    State(state): State<AppState>,
    RecruiterAuth(_): RecruiterAuth,
    Path(candidate_id): Path<i64>,
) -> Result<Response> {
    let svc = ProctorService::new(state.sessions.clone());
    let sessions = svc.candidate_sessions(candidate_id).await?;
    Ok((StatusCode::OK, Json(sessions)).into_response())
}
