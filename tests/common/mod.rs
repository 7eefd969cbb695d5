#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

use proctor_backend::{
    error::{Error, Result},
    models::{
        account::{Account, Role},
        code_playback::CodePlayback,
        integrity_log::IntegrityLog,
        proctor_event::{NewProctorEvent, ProctorEvent},
        proctor_session::{ProctorSession, SessionOverview, SessionStatus},
    },
    routes::build_router,
    services::{
        account_service::{register, AccountRepository},
        session_store::{SessionRepository, Suspension},
    },
    utils::token::TokenCodec,
    AppState,
};

pub const SECRET: &str = "integration-test-secret";

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<(Role, String), Account>>,
    next_id: Mutex<i64>,
}

#[async_trait]
impl AccountRepository for MemoryAccountStore {
    async fn find_by_email(&self, role: Role, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.get(&(role, email.to_lowercase())).cloned())
    }

    async fn create(&self, role: Role, email: &str, password_hash: &str) -> Result<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        let key = (role, email.to_lowercase());
        if accounts.contains_key(&key) {
            return Err(Error::Conflict(format!("A {} with this email already exists", role)));
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let account = Account {
            id: *next_id,
            email: email.to_string(),
            password: password_hash.to_string(),
        };
        accounts.insert(key, account.clone());
        Ok(account)
    }
}

#[derive(Default)]
struct SessionTables {
    sessions: Vec<ProctorSession>,
    events: Vec<ProctorEvent>,
    logs: Vec<IntegrityLog>,
    playbacks: Vec<CodePlayback>,
}

/// Mirrors the row-level rules of the Postgres store.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: Mutex<SessionTables>,
    scan_delay: Mutex<Option<std::time::Duration>>,
}

impl MemorySessionStore {
    /// Makes every stale scan take at least `delay`.
    pub fn slow_scans(&self, delay: std::time::Duration) {
        *self.scan_delay.lock().unwrap() = Some(delay);
    }

    pub fn session(&self, id: i64) -> ProctorSession {
        let tables = self.tables.lock().unwrap();
        tables
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("session exists")
    }

    pub fn set_last_activity(&self, id: i64, at: DateTime<Utc>) {
        let mut tables = self.tables.lock().unwrap();
        let session = tables.sessions.iter_mut().find(|s| s.id == id).unwrap();
        session.last_activity = at;
    }

    pub fn integrity_logs(&self, id: i64) -> Vec<IntegrityLog> {
        let tables = self.tables.lock().unwrap();
        tables.logs.iter().filter(|l| l.session_id == id).cloned().collect()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionStore {
    async fn create_session(
        &self,
        candidate_id: i64,
        assessment_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProctorSession> {
        let mut tables = self.tables.lock().unwrap();
        let session = ProctorSession {
            id: tables.sessions.len() as i64 + 1,
            candidate_id,
            assessment_id,
            status: SessionStatus::Active.as_str().to_string(),
            start_time: at,
            end_time: None,
            last_activity: at,
            is_suspended: false,
            suspension_reason: None,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<ProctorSession>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn list_for_candidate(&self, candidate_id: i64) -> Result<Vec<SessionOverview>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<SessionOverview> = tables
            .sessions
            .iter()
            .filter(|s| s.candidate_id == candidate_id)
            .map(|s| SessionOverview {
                id: s.id,
                assessment_id: s.assessment_id,
                start_time: s.start_time,
                end_time: s.end_time,
                status: s.status.clone(),
                is_suspended: s.is_suspended,
                total_violations: tables.events.iter().filter(|e| e.session_id == s.id).count()
                    as i64,
            })
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }

    async fn touch(&self, session_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_live())
        {
            Some(session) => {
                session.last_activity = session.last_activity.max(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_session(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ProctorSession>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(session) = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && !s.is_completed())
        else {
            return Ok(None);
        };
        session.status = SessionStatus::Completed.as_str().to_string();
        session.end_time = Some(at);
        session.last_activity = session.last_activity.max(at);
        Ok(Some(session.clone()))
    }

    async fn record_event(&self, event: NewProctorEvent) -> Result<ProctorEvent> {
        let mut tables = self.tables.lock().unwrap();
        let row = ProctorEvent {
            id: tables.events.len() as i64 + 1,
            session_id: event.session_id,
            event_type: event.event_type,
            severity: event.severity.as_str().to_string(),
            details: event.details,
            timestamp: event.timestamp,
        };
        tables.events.push(row.clone());
        Ok(row)
    }

    async fn list_events(&self, session_id: i64) -> Result<Vec<ProctorEvent>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .events
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list_integrity_logs(&self, session_id: i64) -> Result<Vec<IntegrityLog>> {
        Ok(self.integrity_logs(session_id))
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ProctorSession>> {
        let delay = *self.scan_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.is_live() && s.last_activity < cutoff)
            .cloned()
            .collect())
    }

    async fn suspend_stale(&self, suspension: Suspension) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        let Some(session) = tables.sessions.iter_mut().find(|s| {
            s.id == suspension.session_id && s.is_live() && s.last_activity < suspension.cutoff
        }) else {
            return Ok(false);
        };
        session.is_suspended = true;
        session.suspension_reason = Some(suspension.reason);

        let log = suspension.log;
        let id = tables.logs.len() as i64 + 1;
        tables.logs.push(IntegrityLog {
            id,
            session_id: log.session_id,
            event: log.event,
            severity: log.severity,
            details: log.details,
            timestamp: log.timestamp,
        });
        Ok(true)
    }

    async fn append_playback(
        &self,
        session_id: i64,
        question_id: i64,
        events: Vec<JsonValue>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tables = self.tables.lock().unwrap();
        let index = match tables
            .playbacks
            .iter()
            .position(|p| p.session_id == session_id && p.question_id == question_id)
        {
            Some(index) => index,
            None => {
                let id = tables.playbacks.len() as i64 + 1;
                tables.playbacks.push(CodePlayback {
                    id,
                    session_id,
                    question_id,
                    events: JsonValue::Array(Vec::new()),
                    created_at: at,
                    updated_at: at,
                });
                tables.playbacks.len() - 1
            }
        };
        let playback = &mut tables.playbacks[index];
        let mut all = playback.event_list();
        all.extend(events);
        let total = all.len() as i64;
        playback.events = JsonValue::Array(all);
        playback.updated_at = at;
        Ok(total)
    }

    async fn get_playback(
        &self,
        session_id: i64,
        question_id: i64,
    ) -> Result<Option<CodePlayback>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .playbacks
            .iter()
            .find(|p| p.session_id == session_id && p.question_id == question_id)
            .cloned())
    }
}

pub struct TestApp {
    pub router: Router,
    pub codec: TokenCodec,
    pub accounts: Arc<MemoryAccountStore>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rps(1_000)
    }

    pub fn with_rps(public_rps: u32) -> Self {
        let codec = TokenCodec::new(SECRET, Duration::minutes(10));
        let accounts = Arc::new(MemoryAccountStore::default());
        let sessions = Arc::new(MemorySessionStore::default());
        let state = AppState::with_repositories(codec.clone(), accounts.clone(), sessions.clone());
        Self {
            router: build_router(state, public_rps),
            codec,
            accounts,
            sessions,
        }
    }

    pub async fn seed(&self, role: Role, email: &str, password: &str) -> Account {
        register(self.accounts.as_ref(), role, email, password)
            .await
            .expect("seed account")
    }

    pub fn token_for(&self, id: i64, role: Role) -> String {
        self.codec.issue(id, None, role).expect("issue token")
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }
}
