use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::models::account::Role;
use crate::utils::token::TokenCodec;
use crate::AppState;

/// Why a request was turned away by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required. Please provide Bearer token.")]
    MissingCredential,

    #[error("Invalid token")]
    Malformed,

    #[error("Token has expired. Please login again.")]
    Expired,

    #[error("Unauthorized: {} access required", required_label(.required))]
    WrongRole { required: Role },

    #[error("Invalid token: Missing user_id")]
    MissingSubject,
}

fn required_label(role: &Role) -> &'static str {
    match role {
        Role::Candidate => "Candidate",
        Role::Recruiter => "Recruiter",
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::WrongRole { .. } => StatusCode::FORBIDDEN,
            AuthError::MissingCredential
            | AuthError::Malformed
            | AuthError::Expired
            | AuthError::MissingSubject => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}

/// Identity established by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: Option<String>,
    pub role: Role,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MissingCredential)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredential)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Checks, in order: credential present, token decodes, role matches,
/// subject present.
pub fn authorize(
    headers: &HeaderMap,
    required: Role,
    codec: &TokenCodec,
) -> Result<Principal, AuthError> {
    let token = bearer_token(headers)?;
    let claims = codec.decode(token)?;

    if claims.role != required {
        return Err(AuthError::WrongRole { required });
    }

    match claims.user_id {
        Some(user_id) if user_id > 0 => Ok(Principal {
            user_id,
            email: claims.email,
            role: claims.role,
        }),
        _ => Err(AuthError::MissingSubject),
    }
}

pub fn require(headers: &HeaderMap, required: Role, codec: &TokenCodec) -> Result<i64, AuthError> {
    authorize(headers, required, codec).map(|principal| principal.user_id)
}

fn guard(parts: &Parts, required: Role, state: &AppState) -> Result<Principal, AuthError> {
    authorize(&parts.headers, required, &state.codec).map_err(|err| {
        tracing::debug!(
            path = %parts.uri.path(),
            required = %required,
            reason = ?err,
            "request rejected by auth guard"
        );
        err
    })
}

/// Extractor for candidate-only handlers.
#[derive(Debug, Clone)]
pub struct CandidateAuth(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CandidateAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, Role::Candidate, state).map(CandidateAuth)
    }
}

/// Extractor for recruiter-only handlers.
#[derive(Debug, Clone)]
pub struct RecruiterAuth(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for RecruiterAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, Role::Recruiter, state).map(RecruiterAuth)
    }
}
