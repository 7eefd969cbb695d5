use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::models::integrity_log::IntegrityLog;
use crate::models::proctor_event::ProctorEvent;
use crate::models::proctor_session::SessionOverview;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(range(min = 1))]
    pub assessment_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub success: bool,
    pub session_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRef {
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub is_suspended: bool,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogEventRequest {
    pub session_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
    pub details: Option<serde_json::Value>,
}

impl LogEventRequest {
    /// Strings are stored verbatim, anything else as compact JSON.
    pub fn details_text(&self) -> Option<String> {
        match &self.details {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEventResponse {
    pub success: bool,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: i64,
    pub candidate_id: i64,
    pub assessment_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub status: String,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub total_count: usize,
    pub by_type: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummaryResponse {
    pub success: bool,
    pub session: SessionDetail,
    pub violations: ViolationSummary,
    pub risk_score: u32,
    pub events: Vec<ProctorEvent>,
    pub integrity_logs: Vec<IntegrityLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSessionsResponse {
    pub success: bool,
    pub candidate_id: i64,
    pub sessions: Vec<SessionOverview>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(details: Option<serde_json::Value>) -> LogEventRequest {
        LogEventRequest {
            session_id: 1,
            event_type: "tab_switch".into(),
            details,
        }
    }

    #[test]
    fn details_are_flattened_to_text() {
        assert_eq!(req(None).details_text(), None);
        assert_eq!(req(Some(json!(null))).details_text(), None);
        assert_eq!(req(Some(json!("left tab"))).details_text().as_deref(), Some("left tab"));
        assert_eq!(
            req(Some(json!({"count": 2}))).details_text().as_deref(),
            Some(r#"{"count":2}"#)
        );
    }
}
