use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::{default_data_path, ensure_tock_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub log: LogSection,
}

/// Who the console speaks as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSection {
    pub user_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSection {
    pub tick_ms: u64,
    /// Virtual time runs this many times faster than real time. Demo use only.
    pub speed_factor: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// Defaults to `~/.tock/data.json`.
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            user_id: "me".to_string(),
            channel_id: "console".to_string(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            speed_factor: 1.0,
        }
    }
}

impl Config {
    pub fn data_file(&self) -> Result<PathBuf> {
        match &self.storage.data_file {
            Some(path) => Ok(path.clone()),
            None => default_data_path(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tock_home()?.join("config.toml"))
}

pub fn parse_config(text: &str) -> Result<Config> {
    toml::from_str(text).context("parse config.toml")
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let cfg = parse_config("[scheduler]\ntick_ms = 250\nspeed_factor = 60.0\n").unwrap();
        assert_eq!(cfg.scheduler.tick_ms, 250);
        assert_eq!(cfg.scheduler.speed_factor, 60.0);
        assert_eq!(cfg.bot, BotSection::default());
        assert_eq!(cfg.log.filter, None);
    }

    #[test]
    fn default_config_round_trips() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(parse_config(&text).unwrap(), Config::default());
    }
}
