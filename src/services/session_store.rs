use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::code_playback::CodePlayback;
use crate::models::integrity_log::{IntegrityLog, NewIntegrityLog};
use crate::models::proctor_event::{NewProctorEvent, ProctorEvent};
use crate::models::proctor_session::{ProctorSession, SessionOverview, SessionStatus};

/// Everything needed to suspend one stale session atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    pub session_id: i64,
    pub reason: String,
    /// Staleness is re-checked against this when writing, so a heartbeat that
    /// lands after the scan keeps the session live.
    pub cutoff: DateTime<Utc>,
    pub log: NewIntegrityLog,
}

/// Persisted proctoring sessions plus their event and integrity trails.
///
/// Writers of `last_activity`, `is_suspended` and `status` are the
/// heartbeat/event handlers and the watchdog; nothing else mutates them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        candidate_id: i64,
        assessment_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProctorSession>;

    async fn get_session(&self, session_id: i64) -> Result<Option<ProctorSession>>;

    async fn list_for_candidate(&self, candidate_id: i64) -> Result<Vec<SessionOverview>>;

    /// Bumps `last_activity` on a live session. `false` when the session is
    /// no longer live.
    async fn touch(&self, session_id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// `None` when the session was already completed.
    async fn complete_session(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ProctorSession>>;

    async fn record_event(&self, event: NewProctorEvent) -> Result<ProctorEvent>;

    async fn list_events(&self, session_id: i64) -> Result<Vec<ProctorEvent>>;

    async fn list_integrity_logs(&self, session_id: i64) -> Result<Vec<IntegrityLog>>;

    /// Live sessions whose `last_activity` is strictly before `cutoff`.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ProctorSession>>;

    /// Flags the session and appends the integrity log in one transaction.
    /// `false` when the session stopped qualifying since the scan.
    async fn suspend_stale(&self, suspension: Suspension) -> Result<bool>;

    /// Appends editor events to the (session, question) recording, creating it
    /// on first use. Returns the recording's total event count.
    async fn append_playback(
        &self,
        session_id: i64,
        question_id: i64,
        events: Vec<JsonValue>,
        at: DateTime<Utc>,
    ) -> Result<i64>;

    async fn get_playback(
        &self,
        session_id: i64,
        question_id: i64,
    ) -> Result<Option<CodePlayback>>;
}

const SESSION_COLUMNS: &str = "id, candidate_id, assessment_id, status, start_time, end_time, \
     last_activity, is_suspended, suspension_reason";

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionStore {
    async fn create_session(
        &self,
        candidate_id: i64,
        assessment_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProctorSession> {
        let sql = format!(
            r#"
            INSERT INTO proctor_sessions (candidate_id, assessment_id, status, start_time, last_activity, is_suspended)
            VALUES ($1, $2, $3, $4, $4, FALSE)
            RETURNING {cols}
            "#,
            cols = SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, ProctorSession>(&sql)
            .bind(candidate_id)
            .bind(assessment_id)
            .bind(SessionStatus::Active.as_str())
            .bind(at)
            .fetch_one(&self.pool)
            .await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<ProctorSession>> {
        let sql = format!(
            "SELECT {cols} FROM proctor_sessions WHERE id = $1",
            cols = SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, ProctorSession>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn list_for_candidate(&self, candidate_id: i64) -> Result<Vec<SessionOverview>> {
        let rows = sqlx::query_as::<_, SessionOverview>(
            r#"
            SELECT s.id, s.assessment_id, s.start_time, s.end_time, s.status, s.is_suspended,
                   COUNT(e.id) AS total_violations
            FROM proctor_sessions s
            LEFT JOIN proctor_events e ON e.session_id = s.id
            WHERE s.candidate_id = $1
            GROUP BY s.id
            ORDER BY s.start_time DESC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn touch(&self, session_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE proctor_sessions
            SET last_activity = GREATEST(last_activity, $2)
            WHERE id = $1 AND status = $3 AND is_suspended = FALSE
            "#,
        )
        .bind(session_id)
        .bind(at)
        .bind(SessionStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_session(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ProctorSession>> {
        let sql = format!(
            r#"
            UPDATE proctor_sessions
            SET status = $2, end_time = $3, last_activity = GREATEST(last_activity, $3)
            WHERE id = $1 AND status <> $2
            RETURNING {cols}
            "#,
            cols = SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, ProctorSession>(&sql)
            .bind(session_id)
            .bind(SessionStatus::Completed.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn record_event(&self, event: NewProctorEvent) -> Result<ProctorEvent> {
        let row = sqlx::query_as::<_, ProctorEvent>(
            r#"
            INSERT INTO proctor_events (session_id, event_type, severity, details, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, session_id, event_type, severity, details, timestamp
            "#,
        )
        .bind(event.session_id)
        .bind(&event.event_type)
        .bind(event.severity.as_str())
        .bind(&event.details)
        .bind(event.timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_events(&self, session_id: i64) -> Result<Vec<ProctorEvent>> {
        let rows = sqlx::query_as::<_, ProctorEvent>(
            r#"
            SELECT id, session_id, event_type, severity, details, timestamp
            FROM proctor_events
            WHERE session_id = $1
            ORDER BY timestamp, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_integrity_logs(&self, session_id: i64) -> Result<Vec<IntegrityLog>> {
        let rows = sqlx::query_as::<_, IntegrityLog>(
            r#"
            SELECT id, session_id, event, severity, details, timestamp
            FROM integrity_logs
            WHERE session_id = $1
            ORDER BY timestamp, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ProctorSession>> {
        let sql = format!(
            r#"
            SELECT {cols}
            FROM proctor_sessions
            WHERE status = $1 AND is_suspended = FALSE AND last_activity < $2
            "#,
            cols = SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProctorSession>(&sql)
            .bind(SessionStatus::Active.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn suspend_stale(&self, suspension: Suspension) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE proctor_sessions
            SET is_suspended = TRUE, suspension_reason = $2
            WHERE id = $1 AND status = $3 AND is_suspended = FALSE AND last_activity < $4
            "#,
        )
        .bind(suspension.session_id)
        .bind(&suspension.reason)
        .bind(SessionStatus::Active.as_str())
        .bind(suspension.cutoff)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let log = &suspension.log;
        sqlx::query(
            r#"
            INSERT INTO integrity_logs (session_id, event, severity, details, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(log.session_id)
        .bind(&log.event)
        .bind(&log.severity)
        .bind(&log.details)
        .bind(log.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn append_playback(
        &self,
        session_id: i64,
        question_id: i64,
        events: Vec<JsonValue>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO code_playbacks (session_id, question_id, events, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (session_id, question_id) DO UPDATE
            SET events = code_playbacks.events || EXCLUDED.events,
                updated_at = EXCLUDED.updated_at
            RETURNING jsonb_array_length(code_playbacks.events)
            "#,
        )
        .bind(session_id)
        .bind(question_id)
        .bind(JsonValue::Array(events))
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(i64::from(total))
    }

    async fn get_playback(
        &self,
        session_id: i64,
        question_id: i64,
    ) -> Result<Option<CodePlayback>> {
        let row = sqlx::query_as::<_, CodePlayback>(
            r#"
            SELECT id, session_id, question_id, events, created_at, updated_at
            FROM code_playbacks
            WHERE session_id = $1 AND question_id = $2
            "#,
        )
        .bind(session_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
