//! Feed fetch abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{FeedEvent, Fid};
use crate::error::Result;

/// Source of raw feed events for a subject.
///
/// Implementations must return every post authored by `subject` and every
/// reply addressed to `subject` from `since` up to now. A partial page is an
/// error, not a result.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the full window. Errors are `TallyError::Fetch` (transport or
    /// status) or `TallyError::Parse` (body).
    async fn fetch(&self, subject: Fid, since: DateTime<Utc>) -> Result<Vec<FeedEvent>>;

    /// Short identifier for logs ("http", "static", ...).
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for std::sync::Arc<T> {
    async fn fetch(&self, subject: Fid, since: DateTime<Utc>) -> Result<Vec<FeedEvent>> {
        (**self).fetch(subject, since).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
