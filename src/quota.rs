//! Daily allowance and reset-boundary math.
//!
//! Every subject may send up to `daily_allowance` tokens per day, where a
//! "day" starts at a fixed UTC hour (`reset_hour_utc`). Nothing here is
//! cached: callers evaluate [`compute_allowance`] on every read because the
//! answer depends on the wall clock.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tokentally::quota::{compute_allowance, ResetHour};
//!
//! let now = Utc.with_ymd_and_hms(2025, 2, 10, 5, 0, 0).unwrap();
//! let allowance = compute_allowance(12, now, ResetHour::MIDNIGHT, 30);
//!
//! assert_eq!(allowance.remaining, 18);
//! assert_eq!(
//!     allowance.next_reset,
//!     Utc.with_ymd_and_hms(2025, 2, 11, 0, 0, 0).unwrap()
//! );
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Length of one allowance period in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Hour of the UTC day (0..=23) at which allowances reset.
///
/// Only constructible through [`ResetHour::new`] / `TryFrom<u8>`, so an
/// out-of-range hour is rejected when config is loaded rather than producing
/// a nonsense boundary later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ResetHour(u8);

impl ResetHour {
    pub const MIDNIGHT: ResetHour = ResetHour(0);

    pub fn new(hour: u8) -> Result<Self, TallyError> {
        if hour > 23 {
            return Err(TallyError::Config(format!(
                "reset_hour_utc must be in 0..=23, got {}",
                hour
            )));
        }
        Ok(Self(hour))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ResetHour {
    fn default() -> Self {
        Self::MIDNIGHT
    }
}

impl TryFrom<u8> for ResetHour {
    type Error = TallyError;

    fn try_from(hour: u8) -> Result<Self, Self::Error> {
        Self::new(hour)
    }
}

impl From<ResetHour> for u8 {
    fn from(hour: ResetHour) -> Self {
        hour.0
    }
}

impl fmt::Display for ResetHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00 UTC", self.0)
    }
}

/// Result of an allowance evaluation at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allowance {
    /// Tokens the subject may still send before the next reset. Never negative.
    pub remaining: u64,
    /// Instant at which the allowance resets.
    pub next_reset: DateTime<Utc>,
}

impl Allowance {
    /// Time left until `next_reset`, clamped at zero.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.next_reset - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// The most recent instant at or before `now` whose UTC time is exactly
/// `reset_hour:00:00.000`.
pub fn reset_boundary(now: DateTime<Utc>, reset_hour: ResetHour) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let today = midnight + TimeDelta::hours(i64::from(reset_hour.get()));
    if now.hour() < u32::from(reset_hour.get()) {
        today - TimeDelta::milliseconds(DAY_MS)
    } else {
        today
    }
}

/// Compute the remaining allowance and the next reset instant.
///
/// `next_reset` is the boundary plus exactly [`DAY_MS`] of elapsed time, so
/// month lengths and leap days never shift it.
pub fn compute_allowance(
    sent_today: u64,
    now: DateTime<Utc>,
    reset_hour: ResetHour,
    daily_allowance: u64,
) -> Allowance {
    let boundary = reset_boundary(now, reset_hour);
    Allowance {
        remaining: daily_allowance.saturating_sub(sent_today),
        next_reset: boundary + TimeDelta::milliseconds(DAY_MS),
    }
}

/// Whether `sent` is strictly over the allowance. Sending exactly the
/// allowance is not an overage.
pub fn is_over_allowance(sent: u64, daily_allowance: u64) -> bool {
    sent > daily_allowance
}

/// Allowance size and reset hour, bundled for callers that evaluate
/// repeatedly against the same configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaPolicy {
    pub daily_allowance: u64,
    pub reset_hour: ResetHour,
}

impl QuotaPolicy {
    pub fn evaluate(&self, sent_today: u64, now: DateTime<Utc>) -> Allowance {
        compute_allowance(sent_today, now, self.reset_hour, self.daily_allowance)
    }

    pub fn is_over(&self, sent: u64) -> bool {
        is_over_allowance(sent, self.daily_allowance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn hour(h: u8) -> ResetHour {
        ResetHour::new(h).unwrap()
    }

    // --- remaining ---

    #[test]
    fn test_remaining_is_allowance_minus_sent() {
        let a = compute_allowance(12, at(2025, 2, 10, 5, 0, 0), hour(0), 30);
        assert_eq!(a.remaining, 18);
    }

    #[test]
    fn test_remaining_never_negative() {
        for sent in [30, 31, 35, 1_000, u64::MAX] {
            let a = compute_allowance(sent, at(2025, 2, 10, 5, 0, 0), hour(0), 30);
            assert_eq!(a.remaining, 0, "sent={sent}");
            assert!(a.is_exhausted());
        }
    }

    #[test]
    fn test_remaining_full_when_nothing_sent() {
        let a = compute_allowance(0, at(2025, 2, 10, 5, 0, 0), hour(0), 30);
        assert_eq!(a.remaining, 30);
        assert!(!a.is_exhausted());
    }

    // --- reset boundary ---

    #[test]
    fn test_documented_example() {
        let now = at(2025, 2, 10, 5, 0, 0);
        assert_eq!(reset_boundary(now, hour(0)), at(2025, 2, 10, 0, 0, 0));
        let a = compute_allowance(12, now, hour(0), 30);
        assert_eq!(a.next_reset, at(2025, 2, 11, 0, 0, 0));
    }

    #[test]
    fn test_before_reset_hour_uses_previous_day() {
        let now = at(2025, 2, 10, 5, 59, 59);
        assert_eq!(reset_boundary(now, hour(6)), at(2025, 2, 9, 6, 0, 0));
        let a = compute_allowance(0, now, hour(6), 30);
        assert_eq!(a.next_reset, at(2025, 2, 10, 6, 0, 0));
    }

    #[test]
    fn test_at_reset_hour_uses_current_day() {
        let now = at(2025, 2, 10, 6, 0, 0);
        assert_eq!(reset_boundary(now, hour(6)), now);
        let a = compute_allowance(0, now, hour(6), 30);
        assert_eq!(a.next_reset, at(2025, 2, 11, 6, 0, 0));
    }

    #[test]
    fn test_after_reset_hour_uses_current_day() {
        let now = at(2025, 2, 10, 23, 30, 0);
        assert_eq!(reset_boundary(now, hour(17)), at(2025, 2, 10, 17, 0, 0));
    }

    #[test]
    fn test_next_reset_is_exactly_one_day_after_boundary() {
        let samples = [
            (at(2024, 2, 28, 12, 0, 0), 13),
            (at(2024, 2, 29, 23, 59, 59), 0),
            (at(2024, 12, 31, 1, 0, 0), 23),
            (at(2025, 3, 1, 0, 0, 0), 5),
        ];
        for (now, h) in samples {
            let boundary = reset_boundary(now, hour(h));
            let next = compute_allowance(0, now, hour(h), 30).next_reset;
            assert_eq!((next - boundary).num_milliseconds(), DAY_MS, "now={now} h={h}");
            assert!(boundary <= now && now < next, "now={now} h={h}");
        }
    }

    #[test]
    fn test_boundary_crosses_month_and_year() {
        assert_eq!(
            reset_boundary(at(2025, 3, 1, 2, 0, 0), hour(12)),
            at(2025, 2, 28, 12, 0, 0)
        );
        assert_eq!(
            reset_boundary(at(2025, 1, 1, 0, 30, 0), hour(1)),
            at(2024, 12, 31, 1, 0, 0)
        );
    }

    #[test]
    fn test_time_until_reset() {
        let now = at(2025, 2, 10, 22, 30, 0);
        let a = compute_allowance(0, now, hour(0), 30);
        assert_eq!(a.time_until_reset(now), Duration::from_secs(90 * 60));
        // Past the reset instant clamps at zero rather than going negative.
        assert_eq!(
            a.time_until_reset(at(2025, 2, 12, 0, 0, 0)),
            Duration::ZERO
        );
    }

    // --- overage ---

    #[test]
    fn test_over_allowance_is_strict() {
        assert!(!is_over_allowance(30, 30));
        assert!(is_over_allowance(31, 30));
        assert!(!is_over_allowance(0, 0));
    }

    // --- ResetHour ---

    #[test]
    fn test_reset_hour_rejects_out_of_range() {
        assert!(ResetHour::new(23).is_ok());
        assert!(matches!(ResetHour::new(24), Err(TallyError::Config(_))));
    }

    #[test]
    fn test_reset_hour_serde() {
        let h: ResetHour = serde_json::from_str("7").unwrap();
        assert_eq!(h.get(), 7);
        assert_eq!(serde_json::to_string(&h).unwrap(), "7");
        assert!(serde_json::from_str::<ResetHour>("24").is_err());
    }

    #[test]
    fn test_reset_hour_display() {
        assert_eq!(hour(5).to_string(), "05:00 UTC");
    }
}
