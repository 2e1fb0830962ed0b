use crate::chunk::{DEFAULT_CHUNK_DELAY_MS, DEFAULT_SIZE_LIMIT};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Maximum serialized size of one outgoing message, shared by the chunk
    /// planner and the size oracle. Platform-specific.
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,

    /// Gap between consecutive fragment sends, in milliseconds.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

fn default_size_limit() -> usize {
    DEFAULT_SIZE_LIMIT
}

fn default_chunk_delay_ms() -> u64 {
    DEFAULT_CHUNK_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            size_limit: default_size_limit(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

impl Config {
    /// Load `~/.clawops/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let clawops_dir = home.join(".clawops");

        if !clawops_dir.exists() {
            fs::create_dir_all(&clawops_dir).context("Failed to create .clawops directory")?;
        }

        Self::load_or_init_at(&clawops_dir.join("config.toml"))
    }

    /// Same as `load_or_init` but against an explicit path (used by tests and
    /// embedders that manage their own config location).
    pub fn load_or_init_at(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config.apply_env_overrides();
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = config_path.to_path_buf();
            config.save()?;
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(limit) = std::env::var("CLAWOPS_SIZE_LIMIT") {
            match limit.parse() {
                Ok(limit) => self.size_limit = limit,
                Err(e) => tracing::warn!("ignoring CLAWOPS_SIZE_LIMIT={limit:?}: {e}"),
            }
        }
        if let Ok(delay) = std::env::var("CLAWOPS_CHUNK_DELAY_MS") {
            match delay.parse() {
                Ok(delay) => self.chunk_delay_ms = delay,
                Err(e) => tracing::warn!("ignoring CLAWOPS_CHUNK_DELAY_MS={delay:?}: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_conventions() {
        let config = Config::default();
        assert_eq!(config.size_limit, 4000);
        assert_eq!(config.chunk_delay_ms, 300);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = toml::from_str("size_limit = 2000").unwrap();
        assert_eq!(config.size_limit, 2000);
        assert_eq!(config.chunk_delay_ms, 300);
    }

    #[test]
    fn first_run_writes_defaults_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.size_limit, 4000);

        let reloaded = Config::load_or_init_at(&path).unwrap();
        assert_eq!(reloaded.chunk_delay_ms, created.chunk_delay_ms);
    }

    #[test]
    fn save_roundtrips_custom_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::load_or_init_at(&path).unwrap();
        config.size_limit = 1234;
        config.save().unwrap();

        let reloaded = Config::load_or_init_at(&path).unwrap();
        assert_eq!(reloaded.size_limit, 1234);
    }
}
