use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no GitHub token found: set GH_PAT or GITHUB_TOKEN")]
    MissingToken,
}

/// Tunables for a collection run. Every field falls back to its default when absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub api_base: String,
    pub filename: String,
    pub qualifiers: String,
    pub size_min: u64,
    pub size_max: u64,
    pub result_cap: u64,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub batch_cooldown_secs: u64,
    pub max_batch_attempts: u32,
    pub fallback_wait_secs: u64,
    pub reset_margin_secs: u64,
    pub fresh_window_days: i64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            api_base: "https://api.github.com".to_string(),
            filename: "agents.md".to_string(),
            qualifiers: "fork:false".to_string(),
            size_min: 0,
            size_max: 100_000,
            result_cap: 1000,
            page_size: 100,
            max_pages: 10,
            page_delay_ms: 3000,
            batch_size: 50,
            batch_delay_ms: 300,
            batch_cooldown_secs: 60,
            max_batch_attempts: 5,
            fallback_wait_secs: 60,
            reset_margin_secs: 1,
            fresh_window_days: 7,
        }
    }
}

impl CollectorConfig {
    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(ConfigError::Read {
                    path: config_path,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })
    }

    pub fn config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("agents-census")
                .join("config.json"),
        )
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_secs(self.batch_cooldown_secs)
    }

    pub fn fallback_wait(&self) -> Duration {
        Duration::from_secs(self.fallback_wait_secs)
    }

    pub fn reset_margin(&self) -> Duration {
        Duration::from_secs(self.reset_margin_secs)
    }

    pub fn fresh_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.fresh_window_days)
    }
}

/// Reads the bearer token from `GH_PAT`, then `GITHUB_TOKEN`. Blank values count as absent.
pub fn token_from_env() -> Result<String, ConfigError> {
    token_from(|key| std::env::var(key).ok())
}

fn token_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    ["GH_PAT", "GITHUB_TOKEN"]
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or(ConfigError::MissingToken)
}
