//! Background sweep that suspends proctoring sessions whose client went quiet.
//!
//! Every `check_interval` the watchdog selects live sessions whose
//! `last_activity` is strictly older than `now - inactivity_threshold` and
//! suspends each one in its own transaction, appending a `CONNECTION_LOST`
//! integrity log. A failed session is left for the next tick; it never stops
//! the rest of the batch.
//!
//! There is no lock shared with request handlers. The store re-checks the
//! cutoff when writing, so a heartbeat committed between scan and write keeps
//! its session live.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::integrity_log::{NewIntegrityLog, EVENT_CONNECTION_LOST, SEVERITY_CRITICAL};
use crate::models::proctor_session::ProctorSession;
use crate::services::session_store::{SessionRepository, Suspension};
use crate::utils::time::{elapsed_seconds, format_audit_timestamp};

pub const SUSPENSION_REASON: &str = "Connection lost - abnormal termination detected";

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    pub check_interval: Duration,
    pub inactivity_threshold: Duration,
    /// Upper bound on how long `stop` waits for an in-flight tick.
    pub stop_timeout: Duration,
}

impl WatchdogSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            check_interval: Duration::from_secs(config.session_check_interval_secs),
            inactivity_threshold: Duration::from_secs(config.session_inactivity_threshold_secs),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            inactivity_threshold: Duration::from_secs(120),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    pub suspended: usize,
    /// Sessions that stopped qualifying between scan and write.
    pub skipped: usize,
    pub failed: usize,
}

/// A single stale-session sweep, independent of any timer.
#[derive(Clone)]
pub struct StaleSessionSweep {
    sessions: Arc<dyn SessionRepository>,
    inactivity_threshold: chrono::Duration,
}

impl StaleSessionSweep {
    pub fn new(sessions: Arc<dyn SessionRepository>, inactivity_threshold: Duration) -> Self {
        let secs = i64::try_from(inactivity_threshold.as_secs()).unwrap_or(i64::MAX);
        Self {
            sessions,
            inactivity_threshold: chrono::Duration::try_seconds(secs)
                .unwrap_or_else(chrono::Duration::max_value),
        }
    }

    /// A threshold reaching past the representable range selects nothing.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.inactivity_threshold)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Only the scan itself can fail the tick; per-session errors are counted.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let cutoff = self.cutoff(now);
        let stale = self.sessions.find_stale(cutoff).await?;

        let mut report = TickReport {
            scanned: stale.len(),
            ..TickReport::default()
        };
        if stale.is_empty() {
            return Ok(report);
        }
        info!(count = stale.len(), "found stale proctoring sessions");

        for session in &stale {
            let inactive_secs = elapsed_seconds(session.last_activity, now);
            match self
                .sessions
                .suspend_stale(suspension_for(session, cutoff, now))
                .await
            {
                Ok(true) => {
                    report.suspended += 1;
                    warn!(
                        session_id = session.id,
                        candidate_id = session.candidate_id,
                        inactive_secs,
                        "suspended stale proctoring session"
                    );
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        session_id = session.id,
                        error = %e,
                        "failed to suspend stale session, retrying next tick"
                    );
                }
            }
        }

        info!(
            suspended = report.suspended,
            skipped = report.skipped,
            failed = report.failed,
            "stale session sweep finished"
        );
        Ok(report)
    }

    async fn run_once(&self) {
        if let Err(e) = self.tick_at(Utc::now()).await {
            error!(error = %e, "stale session scan failed");
        }
    }
}

fn suspension_for(
    session: &ProctorSession,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Suspension {
    Suspension {
        session_id: session.id,
        reason: SUSPENSION_REASON.to_string(),
        cutoff,
        log: NewIntegrityLog {
            session_id: session.id,
            event: EVENT_CONNECTION_LOST.to_string(),
            severity: SEVERITY_CRITICAL.to_string(),
            details: format!(
                "No heartbeat received for {}s. Last activity: {}",
                elapsed_seconds(session.last_activity, now),
                format_audit_timestamp(session.last_activity)
            ),
            timestamp: now,
        },
    }
}

struct RunningLoop {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

enum LoopState {
    Idle,
    Running(RunningLoop),
    /// `stop` is waiting on the loop.
    Stopping,
    /// Cancelled, but its last tick outlived `stop_timeout`.
    Draining(JoinHandle<()>),
}

/// Owns the sweep loop. Created once by `main` and stopped on shutdown.
pub struct SessionWatchdog {
    sweep: StaleSessionSweep,
    check_interval: Duration,
    stop_timeout: Duration,
    state: Mutex<LoopState>,
}

impl SessionWatchdog {
    pub fn new(sessions: Arc<dyn SessionRepository>, settings: WatchdogSettings) -> Self {
        Self {
            sweep: StaleSessionSweep::new(sessions, settings.inactivity_threshold),
            check_interval: settings.check_interval,
            stop_timeout: settings.stop_timeout,
            state: Mutex::new(LoopState::Idle),
        }
    }

    /// Spawns the loop. Returns `false` while a loop is running, being
    /// stopped, or still finishing a tick that outlived `stop`.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match &*state {
            LoopState::Idle => {}
            LoopState::Running(running) if running.handle.is_finished() => {
                warn!("session watchdog loop had exited, restarting");
            }
            LoopState::Draining(handle) if handle.is_finished() => {}
            LoopState::Running(_) => {
                warn!("session watchdog is already running");
                return false;
            }
            LoopState::Stopping | LoopState::Draining(_) => {
                warn!("previous session watchdog loop is still finishing a tick");
                return false;
            }
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.sweep.clone(),
            self.check_interval,
            shutdown.clone(),
        ));
        *state = LoopState::Running(RunningLoop { shutdown, handle });

        info!(
            interval_secs = self.check_interval.as_secs(),
            threshold_secs = self.sweep.inactivity_threshold.num_seconds(),
            "session watchdog started"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        match &*self.state.lock().unwrap_or_else(|p| p.into_inner()) {
            LoopState::Running(running) => !running.handle.is_finished(),
            _ => false,
        }
    }

    /// Signals the loop and waits, bounded by `stop_timeout`, for the current
    /// tick to finish. Returns `false` if it was not running.
    ///
    /// A tick that outlives the timeout keeps its handle, and `start` refuses
    /// to spawn a new loop until it has finished.
    pub async fn stop(&self) -> bool {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            match std::mem::replace(&mut *state, LoopState::Stopping) {
                LoopState::Running(running) => running,
                LoopState::Draining(handle) if handle.is_finished() => {
                    *state = LoopState::Idle;
                    return false;
                }
                other => {
                    *state = other;
                    return false;
                }
            }
        };

        let RunningLoop { shutdown, mut handle } = previous;
        shutdown.cancel();
        let next = match tokio::time::timeout(self.stop_timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!("session watchdog stopped");
                LoopState::Idle
            }
            Ok(Err(e)) => {
                error!(error = %e, "session watchdog task ended abnormally");
                LoopState::Idle
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.stop_timeout.as_secs(),
                    "session watchdog tick still running after stop timeout"
                );
                LoopState::Draining(handle)
            }
        };
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
        true
    }

    /// Runs one sweep immediately, outside the timer.
    pub async fn tick(&self) -> Result<TickReport> {
        self.sweep.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        self.sweep.tick_at(now).await
    }
}

impl Drop for SessionWatchdog {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|p| p.into_inner());
        if let LoopState::Running(running) = state {
            running.shutdown.cancel();
        }
    }
}

async fn run_loop(sweep: StaleSessionSweep, interval: Duration, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        sweep.run_once().await;

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::services::session_store::MockSessionRepository;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    fn stale(id: i64) -> ProctorSession {
        ProctorSession {
            id,
            candidate_id: 40 + id,
            assessment_id: 1,
            status: "active".into(),
            start_time: t0(),
            end_time: None,
            last_activity: t0(),
            is_suspended: false,
            suspension_reason: None,
        }
    }

    fn sweep(repo: MockSessionRepository) -> StaleSessionSweep {
        StaleSessionSweep::new(Arc::new(repo), Duration::from_secs(120))
    }

    #[test]
    fn suspension_carries_audit_details() {
        let now = t0() + chrono::Duration::seconds(150);
        let s = suspension_for(&stale(3), now - chrono::Duration::seconds(120), now);
        assert_eq!(s.reason, SUSPENSION_REASON);
        assert_eq!(s.log.event, "CONNECTION_LOST");
        assert_eq!(s.log.severity, "CRITICAL");
        assert_eq!(
            s.log.details,
            "No heartbeat received for 150s. Last activity: 2026-03-01 10:00:00"
        );
        assert_eq!(s.log.timestamp, now);
    }

    #[tokio::test]
    async fn one_failing_session_does_not_block_the_rest() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_stale()
            .times(1)
            .returning(|_| Ok(vec![stale(1), stale(2), stale(3)]));
        repo.expect_suspend_stale()
            .times(3)
            .returning(|s| match s.session_id {
                2 => Err(Error::Internal("commit failed".into())),
                _ => Ok(true),
            });

        let report = sweep(repo)
            .tick_at(t0() + chrono::Duration::seconds(150))
            .await
            .unwrap();
        assert_eq!(
            report,
            TickReport {
                scanned: 3,
                suspended: 2,
                skipped: 0,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn cutoff_is_now_minus_threshold() {
        let now = t0() + chrono::Duration::seconds(500);
        let mut repo = MockSessionRepository::new();
        repo.expect_find_stale()
            .withf(move |cutoff| *cutoff == now - chrono::Duration::seconds(120))
            .times(1)
            .returning(|_| Ok(Vec::new()));
        repo.expect_suspend_stale().never();

        let report = sweep(repo).tick_at(now).await.unwrap();
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn scan_failure_fails_the_tick() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_stale()
            .returning(|_| Err(Error::Internal("connection refused".into())));
        assert!(sweep(repo).tick_at(t0()).await.is_err());
    }

    #[tokio::test]
    async fn lost_race_counts_as_skipped() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_stale().returning(|_| Ok(vec![stale(8)]));
        repo.expect_suspend_stale().returning(|_| Ok(false));

        let report = sweep(repo)
            .tick_at(t0() + chrono::Duration::seconds(150))
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.suspended, 0);
    }

    #[tokio::test]
    async fn oversized_threshold_selects_nothing() {
        for threshold in [Duration::from_secs(10_000_000_000_000), Duration::from_secs(u64::MAX)] {
            let mut repo = MockSessionRepository::new();
            repo.expect_find_stale()
                .withf(|cutoff| *cutoff == DateTime::<Utc>::MIN_UTC)
                .times(1)
                .returning(|_| Ok(Vec::new()));
            repo.expect_suspend_stale().never();

            let sweep = StaleSessionSweep::new(Arc::new(repo), threshold);
            assert_eq!(sweep.tick_at(t0()).await.unwrap(), TickReport::default());
        }
    }

    #[tokio::test]
    async fn double_start_keeps_one_loop() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_stale().returning(|_| Ok(Vec::new()));

        let watchdog = SessionWatchdog::new(
            Arc::new(repo),
            WatchdogSettings {
                check_interval: Duration::from_millis(20),
                ..WatchdogSettings::default()
            },
        );
        assert!(watchdog.start());
        assert!(!watchdog.start());
        assert!(watchdog.is_running());

        assert!(watchdog.stop().await);
        assert!(!watchdog.is_running());
        assert!(!watchdog.stop().await);
    }
}
