use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Suspended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProctorSession {
    pub id: i64,
    pub candidate_id: i64,
    pub assessment_id: i64,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
}

impl ProctorSession {
    /// A suspended session is not live even while `status` still reads `active`.
    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Active.as_str() && !self.is_suspended
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed.as_str()
    }

    pub fn duration_minutes(&self) -> Option<f64> {
        let end = self.end_time?;
        let minutes = (end - self.start_time).num_milliseconds() as f64 / 60_000.0;
        Some((minutes * 100.0).round() / 100.0)
    }
}

/// One row of a candidate's session history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionOverview {
    pub id: i64,
    pub assessment_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: String,
    pub is_suspended: bool,
    pub total_violations: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> ProctorSession {
        let start = Utc::now();
        ProctorSession {
            id: 1,
            candidate_id: 7,
            assessment_id: 3,
            status: SessionStatus::Active.as_str().to_string(),
            start_time: start,
            end_time: None,
            last_activity: start,
            is_suspended: false,
            suspension_reason: None,
        }
    }

    #[test]
    fn suspended_flag_overrides_active_status() {
        let mut s = session();
        assert!(s.is_live());
        s.is_suspended = true;
        assert_eq!(s.status, "active");
        assert!(!s.is_live());
    }

    #[test]
    fn duration_is_rounded_to_two_decimals() {
        let mut s = session();
        assert_eq!(s.duration_minutes(), None);
        s.end_time = Some(s.start_time + Duration::seconds(95));
        assert_eq!(s.duration_minutes(), Some(1.58));
    }
}
