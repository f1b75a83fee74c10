//! Error types for tokentally.

use thiserror::Error;

/// Errors surfaced by the tracking core.
///
/// `Fetch` and `Parse` are scoped to a single refresh cycle; the refresh loop
/// records them on the snapshot and retries on the next scheduled tick.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Network/transport failure or a non-success response from the feed.
    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    /// The feed answered but the body could not be decoded.
    #[error("Feed response malformed: {0}")]
    Parse(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TallyError {
    /// Whether this error belongs to a single refresh cycle (and should be
    /// retried) rather than to setup.
    pub fn is_cycle_error(&self) -> bool {
        matches!(self, TallyError::Fetch(_) | TallyError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
