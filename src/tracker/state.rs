//! Per-subject accounting state and the snapshot observers read.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::{Subject, Tally};
use crate::quota::QuotaPolicy;

/// Accumulated tracking record for one subject.
///
/// `sent` and `received` are recomputed from each fetched window;
/// `failed_attempts` only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerState {
    pub sent: u64,
    pub received: u64,
    /// Refresh cycles that observed `sent` over the daily allowance.
    pub failed_attempts: u64,
    /// Time of the last successful refresh. `None` until the first one.
    pub last_updated: Option<DateTime<Utc>>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after a successful cycle that produced `tally` at `now`.
    ///
    /// The overage decision looks only at this cycle's `sent`.
    pub fn after_cycle(&self, tally: Tally, policy: &QuotaPolicy, now: DateTime<Utc>) -> Self {
        let over = policy.is_over(tally.sent);
        Self {
            sent: tally.sent,
            received: tally.received,
            failed_attempts: self.failed_attempts + u64::from(over),
            last_updated: Some(now),
        }
    }
}

/// Where the refresh loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Started, no cycle run yet.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The last cycle succeeded.
    Updated,
    /// The last cycle failed; state is from the last success.
    Errored,
    /// Cancelled. Terminal.
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Updated => "updated",
            Phase::Errored => "errored",
            Phase::Stopped => "stopped",
        }
    }
}

/// Point-in-time view published by the refresh loop after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub subject: Subject,
    pub state: TrackerState,
    pub phase: Phase,
    /// Message of the most recent failure; cleared by the next success.
    pub last_error: Option<String>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Completed cycles, successful or not.
    pub cycles: u64,
}

impl TrackerSnapshot {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            state: TrackerState::new(),
            phase: Phase::Idle,
            last_error: None,
            consecutive_failures: 0,
            cycles: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Fetching
    }

    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    /// Record a successful cycle.
    pub(crate) fn succeed(&mut self, state: TrackerState) {
        self.state = state;
        self.phase = Phase::Updated;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.cycles += 1;
    }

    /// Record a failed cycle. `state` is left untouched.
    pub(crate) fn fail(&mut self, error: String) {
        self.phase = Phase::Errored;
        self.last_error = Some(error);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.cycles += 1;
    }
}
