use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::auth_dto::{LoginRequest, LoginResponse, VerifiedUser, VerifyResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::{CandidateAuth, Principal, RecruiterAuth};
use crate::models::account::{AccountView, Role};
use crate::services::account_service::authenticate;
use crate::AppState;

async fn login(state: &AppState, role: Role, payload: LoginRequest) -> Result<Response> {
    let (email, password) = payload
        .credentials()
        .ok_or_else(|| Error::BadRequest("Email and password are required".to_string()))?;
    payload.validate()?;

    let account = authenticate(state.accounts.as_ref(), role, email, password).await?;

    let token = state.codec.issue(account.id, Some(&account.email), role)?;
    tracing::info!(role = %role, account_id = account.id, "login succeeded");

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user: AccountView::from(&account),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

fn verified(principal: Principal) -> Response {
    let response = VerifyResponse {
        valid: true,
        user: VerifiedUser {
            id: principal.user_id,
            email: principal.email,
            role: principal.role,
        },
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[axum::debug_handler]
pub async fn candidate_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    login(&state, Role::Candidate, payload).await
}

#[axum::debug_handler]
pub async fn recruiter_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    login(&state, Role::Recruiter, payload).await
}

#[axum::debug_handler(state = AppState)]
pub async fn candidate_verify(CandidateAuth(principal): CandidateAuth) -> Response {
    verified(principal)
}

#[axum::debug_handler(state = AppState)]
pub async fn recruiter_verify(RecruiterAuth(principal): RecruiterAuth) -> Response {
    verified(principal)
}
