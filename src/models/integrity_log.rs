use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const EVENT_CONNECTION_LOST: &str = "CONNECTION_LOST";
pub const SEVERITY_CRITICAL: &str = "CRITICAL";

/// Append-only audit trail entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IntegrityLog {
    pub id: i64,
    pub session_id: i64,
    pub event: String,
    pub severity: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIntegrityLog {
    pub session_id: i64,
    pub event: String,
    pub severity: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
