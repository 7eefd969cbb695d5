use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::middleware::auth::AuthError;
use crate::models::account::Role;

/// Signed claim set. Wire shape: `{ user_id, email?, type, iat?, exp }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

/// HS256 issue/verify over a shared secret.
///
/// Expiry is checked here rather than by `jsonwebtoken` so the rule is exactly
/// `now >= exp` at second granularity with no leeway. Clock skew between the
/// issuing and verifying hosts is not compensated.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject_id: i64, email: Option<&str>, role: Role) -> Result<String> {
        self.issue_at(subject_id, email, role, self.ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject_id: i64,
        email: Option<&str>,
        role: Role,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = TokenClaims {
            user_id: Some(subject_id),
            email: email.map(str::to_string),
            role,
            iat: Some(issued_at.timestamp()),
            exp: (issued_at + ttl).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn decode(&self, token: &str) -> std::result::Result<TokenClaims, AuthError> {
        self.decode_at(token, Utc::now())
    }

    /// Signature and shape are checked before expiry, so a forged token is
    /// always `Malformed` whatever its `exp` says.
    pub fn decode_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                tracing::debug!(error = %e, "token rejected");
                AuthError::Malformed
            },
        )?;

        if now.timestamp() >= data.claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(data.claims)
    }
}
