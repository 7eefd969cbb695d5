use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Editor events recorded for one question of a session, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodePlayback {
    pub id: i64,
    pub session_id: i64,
    pub question_id: i64,
    /// JSON array; each element is one opaque client event.
    pub events: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodePlayback {
    pub fn event_list(&self) -> Vec<JsonValue> {
        match &self.events {
            JsonValue::Array(events) => events.clone(),
            JsonValue::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}
