//! `tokentally config` command handler.

use std::path::{Path, PathBuf};

use anyhow::Result;

use tokentally::TallyConfig;

use super::{load_config, ConfigAction};

/// `path` never loads the file, so it works even when the config is broken.
pub(crate) fn cmd_config(explicit: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
        }
        ConfigAction::Path => {
            println!("{}", config_file(explicit).display());
        }
    }
    Ok(())
}

fn config_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(TallyConfig::path)
}

fn redacted(config: &TallyConfig) -> TallyConfig {
    let mut shown = config.clone();
    if shown.feed.api_key.is_some() {
        shown.feed.api_key = Some("***".to_string());
    }
    shown
}
