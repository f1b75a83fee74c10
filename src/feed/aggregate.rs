//! Reduce a batch of feed events to sent/received token counts.

use serde::Serialize;

use super::{FeedEvent, Fid};

/// Token counts for one subject over one fetched window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub sent: u64,
    pub received: u64,
}

/// Count literal, non-overlapping occurrences of `marker` in `text`.
///
/// An empty marker never matches.
pub fn count_markers(text: &str, marker: &str) -> u64 {
    if marker.is_empty() {
        return 0;
    }
    text.matches(marker).count() as u64
}

/// Sum marker occurrences authored by `subject` (sent) and in replies to
/// `subject` (received).
///
/// A self-reply counts toward both totals. Time filtering is the fetcher's
/// job; every event passed in is counted.
pub fn aggregate(events: &[FeedEvent], subject: Fid, marker: &str) -> Tally {
    events.iter().fold(Tally::default(), |mut tally, event| {
        let authored = event.author_id == subject;
        let replied_to = event.parent_author_id == Some(subject);
        if !authored && !replied_to {
            return tally;
        }

        let markers = count_markers(&event.text, marker);
        if authored {
            tally.sent += markers;
        }
        if replied_to {
            tally.received += markers;
        }
        tally
    })
}
