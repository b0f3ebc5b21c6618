use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use client_logging::client_info;
use scrapeqa_client::{RuntimeOptions, ServiceSettings};
use scrapeqa_core::{ControllerSettings, ReconnectPolicy};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "scrapeqa.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings read from `scrapeqa.ron`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub progress_path: String,
    pub identity_path: PathBuf,
    pub connect_timeout_secs: u64,
    pub stall_threshold_secs: u64,
    /// Zero disables the stall sweep.
    pub stall_sweep_secs: u64,
    pub reconnect_delay_secs: u64,
    /// `None` retries for as long as a scrape is pending.
    pub reconnect_max_attempts: Option<u32>,
    pub progress_hide_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            progress_path: "/ws".to_string(),
            identity_path: PathBuf::from(".scrapeqa_identity.ron"),
            connect_timeout_secs: 10,
            stall_threshold_secs: 20,
            stall_sweep_secs: 5,
            reconnect_delay_secs: 5,
            reconnect_max_attempts: Some(12),
            progress_hide_millis: 2000,
        }
    }
}

impl AppConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                client_info!("no config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate()?;
        client_info!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if !self.progress_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "progress_path must start with '/', got {:?}",
                self.progress_path
            )));
        }
        if self.identity_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("identity_path is empty".to_string()));
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            stall_threshold: Duration::from_secs(self.stall_threshold_secs),
            reconnect: ReconnectPolicy {
                delay: Duration::from_secs(self.reconnect_delay_secs),
                max_attempts: self.reconnect_max_attempts,
            },
            progress_hide_delay: Duration::from_millis(self.progress_hide_millis),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            api_base_url: self.api_base_url.trim().to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            api_base_url: self.api_base_url.trim().to_string(),
            progress_path: self.progress_path.clone(),
            stall_sweep_interval: Duration::from_secs(self.stall_sweep_secs),
        }
    }
}
