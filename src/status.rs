//! Read model combining tracker state with a fresh allowance evaluation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::feed::Fid;
use crate::quota::QuotaPolicy;
use crate::tracker::TrackerSnapshot;

/// Everything a presentation layer shows for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub fid: Fid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub sent: u64,
    pub received: u64,
    pub failed_attempts: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub daily_allowance: u64,
    pub remaining: u64,
    pub next_reset: DateTime<Utc>,
    pub resets_in_secs: u64,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackerStatus {
    /// Build a status from a snapshot. The allowance is evaluated at `now`,
    /// never cached.
    pub fn from_snapshot(
        snapshot: &TrackerSnapshot,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let state = snapshot.state;
        let allowance = policy.evaluate(state.sent, now);
        Self {
            fid: snapshot.subject.fid,
            display_name: snapshot.subject.profile.display_name.clone(),
            sent: state.sent,
            received: state.received,
            failed_attempts: state.failed_attempts,
            last_updated: state.last_updated,
            daily_allowance: policy.daily_allowance,
            remaining: allowance.remaining,
            next_reset: allowance.next_reset,
            resets_in_secs: allowance.time_until_reset(now).as_secs(),
            loading: snapshot.is_loading(),
            error: snapshot.last_error.clone(),
        }
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => writeln!(f, "{} (fid {})", name, self.fid)?,
            None => writeln!(f, "fid {}", self.fid)?,
        }
        writeln!(
            f,
            "  sent {:>6}   remaining {}/{}",
            self.sent, self.remaining, self.daily_allowance
        )?;
        writeln!(
            f,
            "  received {:>2}   over-allowance cycles {}",
            self.received, self.failed_attempts
        )?;
        writeln!(
            f,
            "  resets in {} (at {})",
            format_duration(Duration::from_secs(self.resets_in_secs)),
            self.next_reset.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        match self.last_updated {
            Some(at) => write!(f, "  updated {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))?,
            None => write!(f, "  not updated yet")?,
        }
        if self.loading {
            write!(f, " (refreshing)")?;
        }
        if let Some(err) = &self.error {
            write!(f, "\n  error: {}", err)?;
        }
        Ok(())
    }
}

/// Compact human duration: `5h 12m`, `12m 3s`, `42s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
