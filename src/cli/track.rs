//! `tokentally track` command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use tokentally::tracker::TrackerSnapshot;
use tokentally::{
    HttpFeedSource, RefreshSettings, Subject, TallyConfig, TrackerStatus, TrackingSession,
};

/// Track `fid`, printing status after every completed cycle until Ctrl-C
/// (or after the first cycle with `once`).
pub(crate) async fn cmd_track(
    config: TallyConfig,
    fid: u64,
    name: Option<String>,
    once: bool,
    json: bool,
) -> Result<()> {
    let source = HttpFeedSource::new(&config.feed).context("Failed to create feed client")?;
    info!(fid, feed = source.base_url(), "Tracking");
    let settings = RefreshSettings::from(&config);
    let policy = settings.policy;

    let mut subject = Subject::new(fid);
    if let Some(name) = name {
        subject = subject.with_display_name(name);
    }

    let mut session = TrackingSession::new(Arc::new(source), settings);
    session.set_subject(subject).await;
    let mut rx = session
        .handle()
        .context("Tracker did not start")?
        .subscribe();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_cycle = 0;
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, stopping tracker");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot: TrackerSnapshot = rx.borrow_and_update().clone();
                if !take_completed(&snapshot, &mut last_cycle) {
                    continue;
                }

                let status = TrackerStatus::from_snapshot(&snapshot, &policy, Utc::now());
                print_status(&status, json)?;

                if once {
                    if let Some(err) = snapshot.last_error {
                        outcome = Err(anyhow::anyhow!(err));
                    }
                    break;
                }
            }
        }
    }

    session.clear().await;
    outcome
}

/// Whether `snapshot` carries a cycle not yet reported. The loop may already
/// be fetching the next cycle; state and error still belong to the last
/// completed one.
fn take_completed(snapshot: &TrackerSnapshot, last_cycle: &mut u64) -> bool {
    if snapshot.cycles == *last_cycle {
        return false;
    }
    *last_cycle = snapshot.cycles;
    true
}

fn print_status(status: &TrackerStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(status)?);
    } else {
        println!("{}", status);
        println!();
    }
    Ok(())
}
