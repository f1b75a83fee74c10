//! End-to-end: HTTP feed → refresh loop → status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tokentally::config::FeedApiConfig;
use tokentally::tracker::Phase;
use tokentally::{
    start_tracking, HttpFeedSource, RefreshSettings, Subject, TallyConfig, TrackerStatus,
};

/// Serve `responses[i]` to the i-th connection, repeating the last one.
async fn feed_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_task = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let n = hits_task.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses[n.min(responses.len() - 1)];
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), hits)
}

fn config(base_url: String) -> TallyConfig {
    TallyConfig {
        daily_allowance: 3,
        refresh_interval_ms: 50,
        feed: FeedApiConfig {
            base_url,
            timeout_secs: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

const PAGE: &str = r#"{"events":[
    {"author_fid": 1, "text": "🎩🎩🎩🎩 gm"},
    {"author_fid": 2, "parent_author_fid": 1, "text": "🎩🎩 back at you"},
    {"author_fid": 1, "parent_author_fid": 1, "text": "🎩"},
    {"author_fid": 3, "parent_author_fid": 2, "text": "🎩🎩🎩"}
]}"#;

#[tokio::test]
async fn test_tracks_sent_received_and_overage_over_http() {
    let (url, hits) = feed_server(vec![(200, PAGE)]).await;
    let cfg = config(url);
    let policy = cfg.quota_policy();
    let source = HttpFeedSource::new(&cfg.feed).unwrap();
    let handle = start_tracking(Subject::new(1), source, RefreshSettings::from(&cfg));

    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.cycles >= 2))
        .await
        .expect("two cycles within 5s")
        .unwrap();
    let snapshot = handle.snapshot();
    handle.stop().await;

    // 4 + 1 sent (self-reply counts as sent), 2 + 1 received.
    assert_eq!(snapshot.state.sent, 5);
    assert_eq!(snapshot.state.received, 3);
    assert!(snapshot.state.failed_attempts >= 2, "over allowance every cycle");
    assert!(hits.load(Ordering::SeqCst) >= 2);

    let status = TrackerStatus::from_snapshot(&snapshot, &policy, Utc::now());
    assert_eq!(status.remaining, 0);
    assert!(status.error.is_none());
}

#[tokio::test]
async fn test_server_error_keeps_last_good_state() {
    let (url, _) = feed_server(vec![(200, PAGE), (500, "boom")]).await;
    let cfg = config(url);
    let source = HttpFeedSource::new(&cfg.feed).unwrap();
    let handle = start_tracking(Subject::new(1), source, RefreshSettings::from(&cfg));

    let mut rx = handle.subscribe();
    let good = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.cycles >= 1))
        .await
        .unwrap()
        .unwrap()
        .clone();
    let failed = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.cycles >= 2))
        .await
        .unwrap()
        .unwrap()
        .clone();
    handle.stop().await;

    assert_eq!(good.phase, Phase::Updated);
    assert_eq!(failed.phase, Phase::Errored);
    assert_eq!(failed.state, good.state);
    assert!(failed.last_error.unwrap().contains("500"));
}
