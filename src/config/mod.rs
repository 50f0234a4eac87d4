#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;
pub const DEFAULT_FTS_CANDIDATE_CAP: usize = 20;
pub const DEFAULT_HYBRID_ALPHA: f64 = 0.7;
pub const DEFAULT_HYBRID_THRESHOLD: f32 = 0.5;

const CONFIG_FILE: &str = "config.toml";

/// Engine configuration, loaded from `<data_dir>/config.toml` when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub embedder_enabled: bool,
    pub cache_capacity: usize,
    pub fts_candidate_cap: usize,
    pub hybrid_alpha: f64,
    pub hybrid_threshold: f32,
    pub strict_ingest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            embedder_enabled: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fts_candidate_cap: DEFAULT_FTS_CANDIDATE_CAP,
            hybrid_alpha: DEFAULT_HYBRID_ALPHA,
            hybrid_threshold: DEFAULT_HYBRID_THRESHOLD,
            strict_ingest: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid hybrid alpha: {0} (must be between 0.0 and 1.0)")]
    InvalidHybridAlpha(f64),
    #[error("Invalid hybrid threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidHybridThreshold(f32),
    #[error("Invalid cache capacity: {0} (must be between 1 and 65536)")]
    InvalidCacheCapacity(usize),
    #[error("Invalid FTS candidate cap: {0} (must be between 1 and 500)")]
    InvalidFtsCandidateCap(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self {
                data_dir: data_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.data_dir = data_dir.as_ref().to_path_buf();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                self.data_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err(ConfigError::InvalidHybridAlpha(self.hybrid_alpha));
        }

        if !(0.0..=1.0).contains(&self.hybrid_threshold) {
            return Err(ConfigError::InvalidHybridThreshold(self.hybrid_threshold));
        }

        if self.cache_capacity == 0 || self.cache_capacity > 65536 {
            return Err(ConfigError::InvalidCacheCapacity(self.cache_capacity));
        }

        if self.fts_candidate_cap == 0 || self.fts_candidate_cap > 500 {
            return Err(ConfigError::InvalidFtsCandidateCap(self.fts_candidate_cap));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Path of the SQLite database holding documents, sections and the FTS index.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docs.db")
    }
}
