use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::connection::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_OTP_TIMEOUT_SECS};

/// Overrides `api_base` from the config file
pub const API_BASE_ENV: &str = "VPNER_API_BASE";

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080/api";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base: String,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub otp_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub token_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval_ms: 5000,
            retry_delay_ms: 5000,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            otp_timeout_secs: DEFAULT_OTP_TIMEOUT_SECS,
            request_timeout_secs: 60,
            token_path: config_dir().join("token"),
        }
    }
}

fn config_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        home.join(".config").join("vpner")
    } else {
        PathBuf::from("./.vpner")
    }
}

impl ClientConfig {
    pub fn default_path() -> PathBuf {
        config_dir().join("client.toml")
    }

    /// Loads the config at `path` (or the default location), falling back to
    /// defaults when the file does not exist, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        let mut config = Self::load_file(&path)?;
        config.apply_env(std::env::var(API_BASE_ENV).ok());
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, api_base: Option<String>) {
        if let Some(api_base) = api_base.filter(|value| !value.trim().is_empty()) {
            self.api_base = api_base;
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
        assert_eq!(config.connect_timeout_secs, 15);
        assert_eq!(config.otp_timeout_secs, 30);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "api_base = \"https://vpn.internal/api\"\npoll_interval_ms = 2000\n",
        )
        .unwrap();

        let config = ClientConfig::load_file(&path).unwrap();
        assert_eq!(config.api_base, "https://vpn.internal/api");
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.retry_delay_ms, 5000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "poll_interval_ms = \"often\"").unwrap();

        assert!(matches!(
            ClientConfig::load_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_api_base() {
        let mut config = ClientConfig::default();
        config.apply_env(Some("http://10.0.0.1:9000/api".to_string()));
        assert_eq!(config.api_base, "http://10.0.0.1:9000/api");

        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.api_base, "http://10.0.0.1:9000/api");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("client.toml");
        let config = ClientConfig {
            retry_delay_ms: 1234,
            ..ClientConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(ClientConfig::load_file(&path).unwrap(), config);
    }
}
