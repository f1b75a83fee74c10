//! Tracker configuration.
//!
//! Loaded from `~/.tokentally/config.json` (or an explicit path), then
//! overridden by `TOKENTALLY_*` environment variables, then validated.
//! Every field has a default so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::quota::{QuotaPolicy, ResetHour};

/// 2025-02-01T00:00:00Z, when tracking began.
const DEFAULT_WINDOW_START_SECS: i64 = 1_738_368_000;
const DEFAULT_DAILY_ALLOWANCE: u64 = 30;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 15 * 60_000;
const DEFAULT_MARKER: &str = "🎩";

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "TOKENTALLY_";

/// Feed API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedApiConfig {
    /// Base URL of the feed API; `/events` is appended.
    pub base_url: String,
    /// Bearer token sent with every request, if set.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Upper bound on pages followed for one window.
    pub max_pages: usize,
}

impl Default for FeedApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_pages: 50,
        }
    }
}

/// Backoff applied after consecutive failed refresh cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Off by default: failures retry on the regular cadence.
    pub enabled: bool,
    /// Cap on the backed-off delay.
    pub max_interval_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_interval_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Tokens each subject may send per day.
    pub daily_allowance: u64,
    /// UTC hour at which the allowance resets.
    pub reset_hour_utc: ResetHour,
    /// Delay between refresh cycles.
    pub refresh_interval_ms: u64,
    /// Start of the fetch window.
    pub window_start: DateTime<Utc>,
    /// Token symbol counted in post text.
    pub marker: String,
    pub backoff: BackoffConfig,
    pub feed: FeedApiConfig,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            daily_allowance: DEFAULT_DAILY_ALLOWANCE,
            reset_hour_utc: ResetHour::MIDNIGHT,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            window_start: DateTime::from_timestamp(DEFAULT_WINDOW_START_SECS, 0)
                .unwrap_or_default(),
            marker: DEFAULT_MARKER.to_string(),
            backoff: BackoffConfig::default(),
            feed: FeedApiConfig::default(),
        }
    }
}

impl TallyConfig {
    /// Canonical config path: `~/.tokentally/config.json`.
    pub fn path() -> PathBuf {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join(".tokentally").join("config.json")
    }

    /// Load from `path` (or the canonical path), apply environment
    /// overrides and validate.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::path);
        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without env overrides or validation.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            TallyError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `TOKENTALLY_*` overrides looked up through `lookup`.
    ///
    /// A present but unparsable value is an error rather than being ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = get("DAILY_ALLOWANCE") {
            self.daily_allowance = parse_env("DAILY_ALLOWANCE", &v)?;
        }
        if let Some(v) = get("RESET_HOUR_UTC") {
            self.reset_hour_utc = ResetHour::new(parse_env("RESET_HOUR_UTC", &v)?)?;
        }
        if let Some(v) = get("REFRESH_INTERVAL_MS") {
            self.refresh_interval_ms = parse_env("REFRESH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("WINDOW_START") {
            self.window_start = DateTime::parse_from_rfc3339(v.trim())
                .map_err(|e| {
                    TallyError::Config(format!("{}WINDOW_START: {}", ENV_PREFIX, e))
                })?
                .with_timezone(&Utc);
        }
        if let Some(v) = get("MARKER") {
            self.marker = v;
        }
        if let Some(v) = get("BACKOFF_ENABLED") {
            self.backoff.enabled = parse_env("BACKOFF_ENABLED", &v)?;
        }
        if let Some(v) = get("FEED_BASE_URL") {
            self.feed.base_url = v.trim().to_string();
        }
        if let Some(v) = get("FEED_API_KEY") {
            self.feed.api_key = Some(v);
        }
        Ok(())
    }

    /// Reject configurations the tracker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(TallyError::Config(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.marker.is_empty() {
            return Err(TallyError::Config("marker must not be empty".to_string()));
        }
        if self.feed.base_url.is_empty() {
            return Err(TallyError::Config(
                "feed.base_url must not be empty".to_string(),
            ));
        }
        if self.feed.timeout_secs == 0 {
            return Err(TallyError::Config(
                "feed.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backoff.enabled && self.backoff.max_interval_ms < self.refresh_interval_ms {
            return Err(TallyError::Config(format!(
                "backoff.max_interval_ms ({}) is below refresh_interval_ms ({})",
                self.backoff.max_interval_ms, self.refresh_interval_ms
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            daily_allowance: self.daily_allowance,
            reset_hour: self.reset_hour_utc,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TallyError::Config(format!("{}{}={:?}: {}", ENV_PREFIX, name, value, e)))
}
