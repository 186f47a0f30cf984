// File-based tracing; stdout belongs to the terminal UI

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ASKBEND_LOG";

pub fn log_path(config_dir: &Path) -> PathBuf {
    config_dir.join("askbend-tui.log")
}

pub fn init_logging(config_dir: &Path) -> Result<PathBuf> {
    let path = log_path(config_dir);
    let log_file = File::create(&path).context("Failed to create log file")?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install tracing subscriber: {err}"))?;

    Ok(path)
}
