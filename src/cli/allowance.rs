//! `tokentally allowance` command handler.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use tokentally::status::format_duration;
use tokentally::TallyConfig;

/// Print remaining allowance and reset time for `sent` tokens.
pub(crate) fn cmd_allowance(config: &TallyConfig, sent: u64, at: Option<&str>) -> Result<()> {
    let now = parse_instant(at)?;
    let allowance = config.quota_policy().evaluate(sent, now);

    println!(
        "{:<12} {}/{}",
        "Remaining",
        allowance.remaining,
        config.daily_allowance
    );
    println!(
        "{:<12} {}",
        "Resets at",
        allowance.next_reset.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!(
        "{:<12} {}",
        "Resets in",
        format_duration(allowance.time_until_reset(now))
    );
    if config.quota_policy().is_over(sent) {
        println!("Over the daily allowance by {}.", sent - config.daily_allowance);
    }
    Ok(())
}

fn parse_instant(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s.trim())
            .with_context(|| format!("Invalid --at timestamp: {}", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
