use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$TOCK_HOME`, or `~/.tock`.
pub fn tock_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TOCK_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tock"))
}

pub fn ensure_tock_home() -> Result<PathBuf> {
    let dir = tock_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn default_data_path() -> Result<PathBuf> {
    Ok(ensure_tock_home()?.join("data.json"))
}
