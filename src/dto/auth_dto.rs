use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::account::{AccountView, Role};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub password: Option<String>,
}

impl LoginRequest {
    /// Both fields present and non-blank, else `None`.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: AccountView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub id: i64,
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: VerifiedUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_yield_no_credentials() {
        let req = LoginRequest {
            email: Some("  ".into()),
            password: Some("pw".into()),
        };
        assert!(req.credentials().is_none());

        let req = LoginRequest {
            email: Some("a@example.com".into()),
            password: None,
        };
        assert!(req.credentials().is_none());
    }

    #[test]
    fn email_format_is_validated() {
        let req = LoginRequest {
            email: Some("not-an-email".into()),
            password: Some("pw".into()),
        };
        assert!(req.validate().is_err());
    }
}
