//! Per-subject tracking: state, the refresh loop, and session ownership.

pub mod backoff;
pub mod refresh;
pub mod session;
pub mod state;

pub use backoff::Backoff;
pub use refresh::{start_tracking, RefreshSettings, TrackerHandle};
pub use session::TrackingSession;
pub use state::{Phase, TrackerSnapshot, TrackerState};
