use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("unable to resolve cache directory")?;
    Ok(base.join("tracksmith").join("tracksmith.db"))
}

pub fn default_download_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("tracksmith").join("downloads"))
}

pub fn default_splits_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("tracksmith").join("splits"))
}

pub fn archive_file_path(playlist_id: &str) -> Result<PathBuf> {
    let base = dirs::cache_dir().context("unable to resolve cache directory")?;
    Ok(base
        .join("tracksmith")
        .join(format!("ytdlp_archive_{playlist_id}.txt")))
}

pub fn default_beets_config() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("beets").join("config.yaml"))
}
