//! HTTP feed source.
//!
//! Talks to a JSON feed API:
//!
//! ```text
//! GET {base_url}/events?fid=<fid>&since=<rfc3339>[&cursor=<c>]
//! Authorization: Bearer <api_key>        (optional)
//!
//! { "events": [ { "author_fid": 1, "parent_author_fid": 2, "text": "..." } ],
//!   "next_cursor": "..." }
//! ```
//!
//! Pages are followed until `next_cursor` is absent, so a window is never
//! silently truncated. Hitting `max_pages` is reported as a fetch error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{FeedEvent, FeedSource, Fid};
use crate::config::FeedApiConfig;
use crate::error::{Result, TallyError};

/// Longest response body excerpt carried in an error message.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    events: Vec<FeedEvent>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// [`FeedSource`] backed by the feed HTTP API.
pub struct HttpFeedSource {
    base_url: String,
    api_key: Option<String>,
    max_pages: usize,
    http: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(config: &FeedApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TallyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            max_pages: config.max_pages.max(1),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(
        &self,
        subject: Fid,
        since: &str,
        cursor: Option<&str>,
    ) -> Result<FeedPage> {
        let mut req = self
            .http
            .get(format!("{}/events", self.base_url))
            .query(&[("fid", subject.to_string().as_str()), ("since", since)]);
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TallyError::Fetch(format!("HTTP request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TallyError::Fetch(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(TallyError::Fetch(format!(
                "HTTP {} from feed: {}",
                status,
                excerpt(&body)
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| TallyError::Parse(format!("Failed to parse feed page: {}", e)))
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, subject: Fid, since: DateTime<Utc>) -> Result<Vec<FeedEvent>> {
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 1..=self.max_pages {
            let page = self.fetch_page(subject, &since, cursor.as_deref()).await?;
            debug!(
                fid = subject,
                page = page_no,
                events = page.events.len(),
                "Fetched feed page"
            );
            events.extend(page.events);

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(events),
            }
        }

        Err(TallyError::Fetch(format!(
            "feed window for fid {} exceeds {} pages",
            subject, self.max_pages
        )))
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
