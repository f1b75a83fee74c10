//! tokentally: daily token allowance tracking over a social feed.
//!
//! Each user may send a bounded number of marked tokens per day. This crate
//! fetches a user's posts and replies, counts tokens sent and received,
//! records how often the allowance was exceeded, and reports when it resets.
//!
//! - [`quota`]: allowance and reset-boundary math
//! - [`feed`]: events, the [`feed::FeedSource`] trait, HTTP source, aggregation
//! - [`tracker`]: per-subject state and the refresh loop
//! - [`status`]: read model for presentation

pub mod config;
pub mod error;
pub mod feed;
pub mod quota;
pub mod status;
pub mod tracker;

pub use config::TallyConfig;
pub use error::{Result, TallyError};
pub use feed::{FeedEvent, FeedSource, HttpFeedSource, Subject};
pub use quota::{compute_allowance, Allowance, QuotaPolicy, ResetHour};
pub use status::TrackerStatus;
pub use tracker::{start_tracking, RefreshSettings, TrackerHandle, TrackingSession};
