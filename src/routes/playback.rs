use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::playback_dto::{RecordPlaybackRequest, RecordPlaybackResponse};
use crate::error::Result;
use crate::middleware::auth::{CandidateAuth, RecruiterAuth};
use crate::services::proctor_service::ProctorService;
use crate::utils::time::now;
use crate::AppState;

#[axum::debug_handler]
pub async fn record_playback(
    State(state): State<AppState>,
    CandidateAuth(principal): CandidateAuth,
    Json(payload): Json<RecordPlaybackRequest>,
) -> Result<Response> {
    payload.validate()?;
    let svc = ProctorService::new(state.sessions.clone());
    let total_events = svc
        .record_playback(
            payload.session_id,
            principal.user_id,
            payload.question_id,
            payload.events,
            now(),
        )
        .await?;

    let response = RecordPlaybackResponse {
        success: true,
        total_events,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[axum::debug_handler]
pub async fn get_playback(
    State(state): State<AppState>,
    RecruiterAuth(_): RecruiterAuth,
    Path((session_id, question_id)): Path<(i64, i64)>,
) -> Result<Response> {
    let svc = ProctorService::new(state.sessions.clone());
    let playback = svc.playback(session_id, question_id).await?;
    Ok((StatusCode::OK, Json(playback)).into_response())
}
