use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordPlaybackRequest {
    pub session_id: i64,
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub events: Vec<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPlaybackResponse {
    pub success: bool,
    pub total_events: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub success: bool,
    pub session_id: i64,
    pub question_id: i64,
    pub events: Vec<JsonValue>,
    pub updated_at: DateTime<Utc>,
}
