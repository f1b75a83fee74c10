//! A tracking session: at most one active subject at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::refresh::{start_tracking, RefreshSettings, TrackerHandle};
use crate::feed::{FeedSource, Subject};
use crate::status::TrackerStatus;

/// Owns the refresh loop for whichever subject is currently active.
///
/// Switching subjects stops the old loop (dropping its state) and starts a
/// fresh one from zero. Sessions share nothing with each other.
pub struct TrackingSession {
    source: Arc<dyn FeedSource>,
    settings: RefreshSettings,
    active: Option<TrackerHandle>,
}

impl TrackingSession {
    pub fn new(source: Arc<dyn FeedSource>, settings: RefreshSettings) -> Self {
        Self {
            source,
            settings,
            active: None,
        }
    }

    /// Make `subject` the active subject.
    ///
    /// Returns `false` if it was already active (nothing restarted); its
    /// profile is still updated.
    pub async fn set_subject(&mut self, subject: Subject) -> bool {
        if let Some(handle) = self
            .active
            .as_mut()
            .filter(|h| h.subject().fid == subject.fid)
        {
            if handle.subject().profile != subject.profile {
                debug!(fid = subject.fid, "Updating subject profile");
                handle.set_profile(subject.profile);
            }
            return false;
        }

        if let Some(previous) = self.active.take() {
            info!(
                from = previous.subject().fid,
                to = subject.fid,
                "Switching tracked subject"
            );
            previous.stop().await;
        }

        self.active = Some(start_tracking(
            subject,
            Arc::clone(&self.source),
            self.settings.clone(),
        ));
        true
    }

    /// End the session, stopping any active loop.
    pub async fn clear(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.stop().await;
        }
    }

    pub fn handle(&self) -> Option<&TrackerHandle> {
        self.active.as_ref()
    }

    /// Status of the active subject evaluated at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> Option<TrackerStatus> {
        self.active
            .as_ref()
            .map(|h| TrackerStatus::from_snapshot(&h.snapshot(), &self.settings.policy, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::feed::{FeedEvent, Fid};
    use crate::quota::{QuotaPolicy, ResetHour};
    use crate::tracker::{Backoff, Phase};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Every subject sends as many markers as its fid.
    struct EchoSource;

    #[async_trait]
    impl FeedSource for EchoSource {
        async fn fetch(&self, subject: Fid, _since: DateTime<Utc>) -> Result<Vec<FeedEvent>> {
            Ok(vec![FeedEvent::post(subject, "🎩".repeat(subject as usize))])
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn session() -> TrackingSession {
        TrackingSession::new(
            Arc::new(EchoSource),
            RefreshSettings {
                policy: QuotaPolicy {
                    daily_allowance: 30,
                    reset_hour: ResetHour::MIDNIGHT,
                },
                marker: "🎩".to_string(),
                window_start: DateTime::from_timestamp(0, 0).unwrap(),
                backoff: Backoff::fixed(Duration::from_secs(60)),
            },
        )
    }

    async fn settle(session: &TrackingSession) {
        let mut rx = session.handle().unwrap().subscribe();
        rx.wait_for(|s| s.cycles >= 1).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_subject_starts_tracking() {
        let mut s = session();
        assert!(s.status(Utc::now()).is_none());

        assert!(s.set_subject(Subject::new(3)).await);
        settle(&s).await;

        let status = s.status(Utc::now()).unwrap();
        assert_eq!(status.fid, 3);
        assert_eq!(status.sent, 3);
        assert_eq!(status.remaining, 27);
        s.clear().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_subject_is_noop() {
        let mut s = session();
        assert!(s.set_subject(Subject::new(3)).await);
        assert!(!s.set_subject(Subject::new(3)).await);
        s.clear().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_subject_new_name_updates_profile_without_restart() {
        let mut s = session();
        assert!(s.set_subject(Subject::new(3).with_display_name("old")).await);
        settle(&s).await;
        let rx = s.handle().unwrap().subscribe();
        let cycles = rx.borrow().cycles;

        assert!(!s.set_subject(Subject::new(3).with_display_name("new")).await);
        let status = s.status(Utc::now()).unwrap();
        assert_eq!(status.display_name.as_deref(), Some("new"));
        assert_eq!(status.sent, 3);
        assert_eq!(
            s.handle().unwrap().subject().profile.display_name.as_deref(),
            Some("new")
        );
        assert_eq!(rx.borrow().cycles, cycles, "loop was not restarted");
        assert_ne!(rx.borrow().phase, Phase::Stopped);
        s.clear().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_subject_stops_old_loop_and_resets_state() {
        let mut s = session();
        s.set_subject(Subject::new(40)).await;
        settle(&s).await;
        let old_rx = s.handle().unwrap().subscribe();
        assert_eq!(old_rx.borrow().state.failed_attempts, 1);

        assert!(s.set_subject(Subject::new(5)).await);
        assert_eq!(old_rx.borrow().phase, Phase::Stopped);

        settle(&s).await;
        let status = s.status(Utc::now()).unwrap();
        assert_eq!(status.fid, 5);
        assert_eq!(status.sent, 5);
        assert_eq!(status.failed_attempts, 0, "new subject starts from zero");
        s.clear().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_ends_session() {
        let mut s = session();
        s.set_subject(Subject::new(1)).await;
        let rx = s.handle().unwrap().subscribe();
        s.clear().await;
        assert!(s.handle().is_none());
        assert_eq!(rx.borrow().phase, Phase::Stopped);
    }
}
