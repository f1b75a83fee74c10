//! Feed events, the fetch abstraction, and the sent/received reducer.

pub mod aggregate;
pub mod http;
pub mod source;

use serde::{Deserialize, Serialize};

pub use aggregate::{aggregate, count_markers, Tally};
pub use http::HttpFeedSource;
pub use source::FeedSource;

/// Opaque user identifier on the feed.
pub type Fid = u64;

/// A single post or reply as returned by the feed.
///
/// Transient: events are reduced to counts and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(rename = "author_fid")]
    pub author_id: Fid,
    /// Author of the post this event replies to, if it is a reply.
    #[serde(rename = "parent_author_fid", default)]
    pub parent_author_id: Option<Fid>,
    pub text: String,
}

impl FeedEvent {
    pub fn post(author_id: Fid, text: impl Into<String>) -> Self {
        Self {
            author_id,
            parent_author_id: None,
            text: text.into(),
        }
    }

    pub fn reply(author_id: Fid, parent_author_id: Fid, text: impl Into<String>) -> Self {
        Self {
            author_id,
            parent_author_id: Some(parent_author_id),
            text: text.into(),
        }
    }
}

/// Display-only profile metadata. Never read by the accounting core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The user being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub fid: Fid,
    #[serde(default)]
    pub profile: Profile,
}

impl Subject {
    pub fn new(fid: Fid) -> Self {
        Self {
            fid,
            profile: Profile::default(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.profile.display_name = Some(name.into());
        self
    }

    /// Label for logs and CLI output: display name when known, else the fid.
    pub fn label(&self) -> String {
        match &self.profile.display_name {
            Some(name) => format!("{} (fid {})", name, self.fid),
            None => format!("fid {}", self.fid),
        }
    }
}
