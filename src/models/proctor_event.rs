use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Info => "info",
            EventSeverity::Warning => "warning",
            EventSeverity::Critical => "critical",
        }
    }

    pub fn for_event_type(event_type: &str) -> Self {
        match event_type {
            "multiple_faces" | "no_face" | "phone_detected" => EventSeverity::Critical,
            "looking_away" | "tab_switch" => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

/// Client-reported proctoring event (tab switch, face checks, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProctorEvent {
    pub id: i64,
    pub session_id: i64,
    pub event_type: String,
    pub severity: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProctorEvent {
    pub session_id: i64,
    pub event_type: String,
    pub severity: EventSeverity,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
