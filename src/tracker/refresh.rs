//! Timer-driven refresh loop for one subject.
//!
//! [`start_tracking`] spawns the loop and returns a [`TrackerHandle`] that
//! owns its cancellation. The loop fetches immediately, then after every
//! completed cycle waits `refresh_interval` (or the backed-off delay) before
//! the next one. A cycle is always awaited to completion before the next is
//! scheduled, so there is never more than one fetch in flight per subject.
//!
//! Cancellation races the in-flight fetch: its result is dropped, and once
//! [`TrackerHandle::stop`] returns the state is never touched again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::state::{Phase, TrackerSnapshot};
use crate::config::TallyConfig;
use crate::feed::{aggregate, FeedSource, Profile, Subject};
use crate::quota::QuotaPolicy;

/// Everything a loop needs from configuration.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub policy: QuotaPolicy,
    pub marker: String,
    pub window_start: DateTime<Utc>,
    pub backoff: Backoff,
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        self.backoff.delay(0)
    }
}

impl From<&TallyConfig> for RefreshSettings {
    fn from(config: &TallyConfig) -> Self {
        Self {
            policy: config.quota_policy(),
            marker: config.marker.clone(),
            window_start: config.window_start,
            backoff: Backoff::new(config.refresh_interval(), &config.backoff),
        }
    }
}

/// Owner of a running refresh loop.
///
/// Dropping the handle cancels the loop without waiting for it; call
/// [`TrackerHandle::stop`] to wait until it has fully exited.
pub struct TrackerHandle {
    subject: Subject,
    tx: Arc<watch::Sender<TrackerSnapshot>>,
    rx: watch::Receiver<TrackerSnapshot>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every phase or state change.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.rx.clone()
    }

    /// Run a cycle now instead of waiting for the timer. Requests made while
    /// a cycle is in flight collapse into one follow-up cycle.
    pub fn refresh_now(&self) {
        self.wake.notify_one();
    }

    /// Replace the display profile. Counts and schedule are untouched.
    pub fn set_profile(&mut self, profile: Profile) {
        self.subject.profile = profile.clone();
        self.tx.send_modify(|s| s.subject.profile = profile);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop and wait for it to exit. Any in-flight fetch result
    /// is discarded.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(fid = self.subject.fid, error = %e, "Refresh loop task failed");
            }
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerHandle")
            .field("fid", &self.subject.fid)
            .field("phase", &self.rx.borrow().phase)
            .finish()
    }
}

/// Start tracking `subject`. Must be called from within a Tokio runtime.
pub fn start_tracking<S>(subject: Subject, source: S, settings: RefreshSettings) -> TrackerHandle
where
    S: FeedSource + 'static,
{
    let (tx, rx) = watch::channel(TrackerSnapshot::new(subject.clone()));
    let tx = Arc::new(tx);
    let cancel = CancellationToken::new();
    let wake = Arc::new(Notify::new());

    let refresh = RefreshLoop {
        fid: subject.fid,
        source,
        settings,
        tx: Arc::clone(&tx),
        cancel: cancel.clone(),
        wake: Arc::clone(&wake),
    };

    info!(
        subject = %subject.label(),
        interval_ms = refresh.settings.interval().as_millis() as u64,
        "Starting tracker"
    );
    let task = tokio::spawn(refresh.run());

    TrackerHandle {
        subject,
        tx,
        rx,
        cancel,
        wake,
        task: Some(task),
    }
}

struct RefreshLoop<S> {
    fid: u64,
    source: S,
    settings: RefreshSettings,
    tx: Arc<watch::Sender<TrackerSnapshot>>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

impl<S: FeedSource> RefreshLoop<S> {
    async fn run(self) {
        loop {
            if !self.run_cycle().await {
                break;
            }

            let failures = self.tx.borrow().consecutive_failures;
            let delay = self.settings.backoff.delay(failures);
            if failures > 0 {
                debug!(
                    fid = self.fid,
                    failures,
                    delay_ms = delay.as_millis() as u64,
                    "Next refresh delayed"
                );
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
                _ = self.wake.notified() => {
                    debug!(fid = self.fid, "Refresh requested");
                }
            }
        }

        self.set_phase(Phase::Stopped);
        info!(fid = self.fid, "Tracker stopped");
    }

    fn set_phase(&self, phase: Phase) {
        debug!(fid = self.fid, phase = phase.as_str(), "Tracker phase");
        self.tx.send_modify(|s| s.phase = phase);
    }

    /// Run one fetch → aggregate → apply cycle. Returns `false` when
    /// cancelled, in which case nothing was applied.
    async fn run_cycle(&self) -> bool {
        self.set_phase(Phase::Fetching);

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(fid = self.fid, "Discarding in-flight fetch");
                return false;
            }
            result = self.source.fetch(self.fid, self.settings.window_start) => result,
        };
        if self.cancel.is_cancelled() {
            return false;
        }

        match fetched {
            Ok(events) => {
                let tally = aggregate(&events, self.fid, &self.settings.marker);
                let policy = self.settings.policy;
                let next = self.tx.borrow().state.after_cycle(tally, &policy, Utc::now());

                if policy.is_over(tally.sent) {
                    warn!(
                        fid = self.fid,
                        sent = tally.sent,
                        allowance = policy.daily_allowance,
                        failed_attempts = next.failed_attempts,
                        "Sent over daily allowance"
                    );
                }
                info!(
                    fid = self.fid,
                    source = self.source.name(),
                    events = events.len(),
                    sent = next.sent,
                    received = next.received,
                    "Refresh complete"
                );
                self.tx.send_modify(|s| s.succeed(next));
            }
            Err(e) if e.is_cycle_error() => {
                warn!(
                    fid = self.fid,
                    source = self.source.name(),
                    error = %e,
                    "Refresh failed; keeping previous state"
                );
                self.tx.send_modify(|s| s.fail(e.to_string()));
            }
            Err(e) => {
                error!(
                    fid = self.fid,
                    source = self.source.name(),
                    error = %e,
                    "Feed source error; keeping previous state"
                );
                self.tx.send_modify(|s| s.fail(e.to_string()));
            }
        }
        true
    }
}
