use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use uploader_engine::{ApiSettings, PollSettings};
use uploader_logging::{LogDestination, DEFAULT_LOG_FILE};

use crate::cli::Overrides;

pub const DEFAULT_CONFIG_FILE: &str = "./uploader.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Settings read from the RON configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub category: Option<String>,
    pub poll_interval_ms: u64,
    pub max_poll_cycles: Option<u32>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_destination: LogDestination,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000/".to_string(),
            api_key: None,
            category: None,
            poll_interval_ms: 1000,
            max_poll_cycles: Some(600),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            log_destination: LogDestination::Terminal,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path,
            message: err.to_string(),
        })
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(server) = &overrides.server {
            self.server_url = server.clone();
        }
        if let Some(api_key) = &overrides.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(category) = &overrides.category {
            self.category = Some(category.clone());
        }
        if let Some(interval) = overrides.poll_interval_ms {
            self.poll_interval_ms = interval;
        }
        if let Some(cycles) = overrides.max_poll_cycles {
            self.max_poll_cycles = Some(cycles);
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.server_url.clone(),
            api_key: self.api_key.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_cycles: self.max_poll_cycles,
        }
    }
}
