use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::dto::playback_dto::PlaybackResponse;
use crate::dto::proctor_dto::{
    CandidateSessionsResponse, SessionDetail, SessionSummaryResponse, ViolationSummary,
};
use crate::error::{Error, Result};
use crate::models::proctor_event::{EventSeverity, NewProctorEvent, ProctorEvent};
use crate::models::proctor_session::ProctorSession;
use crate::services::session_store::SessionRepository;

const RISK_SCORE_CAP: u32 = 100;

fn risk_weight(event_type: &str) -> u32 {
    match event_type {
        "no_face" => 10,
        "multiple_faces" => 25,
        "looking_away" => 5,
        "tab_switch" => 15,
        "phone_detected" => 20,
        _ => 0,
    }
}

pub fn count_violations(events: &[ProctorEvent]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.event_type.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn risk_score(counts: &BTreeMap<String, u32>) -> u32 {
    let raw: u32 = counts
        .iter()
        .map(|(event_type, count)| risk_weight(event_type).saturating_mul(*count))
        .fold(0, u32::saturating_add);
    raw.min(RISK_SCORE_CAP)
}

/// Candidate-facing session operations plus the recruiter read views.
#[derive(Clone)]
pub struct ProctorService {
    sessions: Arc<dyn SessionRepository>,
}

impl ProctorService {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    /// Unknown sessions and sessions owned by someone else look the same.
    async fn owned_session(&self, session_id: i64, candidate_id: i64) -> Result<ProctorSession> {
        match self.sessions.get_session(session_id).await? {
            Some(session) if session.candidate_id == candidate_id => Ok(session),
            _ => Err(Error::NotFound("Invalid session".to_string())),
        }
    }

    pub async fn start_session(
        &self,
        candidate_id: i64,
        assessment_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProctorSession> {
        let session = self
            .sessions
            .create_session(candidate_id, assessment_id, at)
            .await?;
        tracing::info!(
            session_id = session.id,
            candidate_id,
            assessment_id,
            "proctoring session started"
        );
        Ok(session)
    }

    pub async fn end_session(
        &self,
        session_id: i64,
        candidate_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProctorSession> {
        let session = self.owned_session(session_id, candidate_id).await?;
        if session.is_completed() {
            return Err(Error::Conflict("Session already completed".to_string()));
        }
        let ended = self
            .sessions
            .complete_session(session_id, at)
            .await?
            .ok_or_else(|| Error::Conflict("Session already completed".to_string()))?;
        tracing::info!(
            session_id,
            candidate_id,
            was_suspended = ended.is_suspended,
            "proctoring session completed"
        );
        Ok(ended)
    }

    pub async fn heartbeat(
        &self,
        session_id: i64,
        candidate_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let session = self.owned_session(session_id, candidate_id).await?;
        if !session.is_live() || !self.sessions.touch(session_id, at).await? {
            return Err(not_live(&session));
        }
        Ok(at.max(session.last_activity))
    }

    /// Records a client event and counts it as activity. Sessions that are no
    /// longer live take no further events.
    pub async fn log_event(
        &self,
        session_id: i64,
        candidate_id: i64,
        event_type: &str,
        details: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ProctorEvent> {
        let session = self.owned_session(session_id, candidate_id).await?;
        if !session.is_live() {
            return Err(not_live(&session));
        }
        let severity = EventSeverity::for_event_type(event_type);

        let event = self
            .sessions
            .record_event(NewProctorEvent {
                session_id,
                event_type: event_type.to_string(),
                severity,
                details,
                timestamp: at,
            })
            .await?;

        if !self.sessions.touch(session_id, at).await? {
            tracing::debug!(session_id, "event recorded as session was being suspended");
        }

        match severity {
            EventSeverity::Critical => tracing::warn!(
                session_id,
                candidate_id,
                event_type,
                "critical proctoring event"
            ),
            EventSeverity::Warning => {
                tracing::info!(session_id, candidate_id, event_type, "proctoring warning")
            }
            EventSeverity::Info => {
                tracing::debug!(session_id, candidate_id, event_type, "proctoring event")
            }
        }
        Ok(event)
    }

    pub async fn summary(&self, session_id: i64) -> Result<SessionSummaryResponse> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        let events = self.sessions.list_events(session_id).await?;
        let integrity_logs = self.sessions.list_integrity_logs(session_id).await?;

        let by_type = count_violations(&events);
        let score = risk_score(&by_type);

        Ok(SessionSummaryResponse {
            success: true,
            session: SessionDetail {
                id: session.id,
                candidate_id: session.candidate_id,
                assessment_id: session.assessment_id,
                start_time: session.start_time,
                end_time: session.end_time,
                last_activity: session.last_activity,
                duration_minutes: session.duration_minutes(),
                status: session.status,
                is_suspended: session.is_suspended,
                suspension_reason: session.suspension_reason,
            },
            violations: ViolationSummary {
                total_count: events.len(),
                by_type,
            },
            risk_score: score,
            events,
            integrity_logs,
        })
    }

    /// Appends editor events for one question. Counts as session activity,
    /// so only live sessions accept recordings.
    pub async fn record_playback(
        &self,
        session_id: i64,
        candidate_id: i64,
        question_id: i64,
        events: Vec<JsonValue>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let session = self.owned_session(session_id, candidate_id).await?;
        if !session.is_live() {
            return Err(not_live(&session));
        }

        let batch = events.len();
        let total = self
            .sessions
            .append_playback(session_id, question_id, events, at)
            .await?;
        self.sessions.touch(session_id, at).await?;

        tracing::debug!(session_id, question_id, batch, total, "playback events recorded");
        Ok(total)
    }

    pub async fn playback(&self, session_id: i64, question_id: i64) -> Result<PlaybackResponse> {
        let recording = self
            .sessions
            .get_playback(session_id, question_id)
            .await?
            .ok_or_else(|| Error::NotFound("No recording found".to_string()))?;

        Ok(PlaybackResponse {
            success: true,
            session_id,
            question_id,
            events: recording.event_list(),
            updated_at: recording.updated_at,
        })
    }

    pub async fn candidate_sessions(&self, candidate_id: i64) -> Result<CandidateSessionsResponse> {
        let sessions = self.sessions.list_for_candidate(candidate_id).await?;
        Ok(CandidateSessionsResponse {
            success: true,
            candidate_id,
            sessions,
        })
    }
}

fn not_live(session: &ProctorSession) -> Error {
    if session.is_completed() {
        Error::Conflict("Session already completed".to_string())
    } else {
        Error::Conflict(format!(
            "Session suspended: {}",
            session
                .suspension_reason
                .as_deref()
                .unwrap_or("no activity received")
        ))
    }
}
