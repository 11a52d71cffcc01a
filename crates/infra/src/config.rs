//! Agent configuration.
//!
//! Loaded once at startup from a JSON file. The file path is the first
//! command-line argument, or `JOBRELAY_CONFIG` when no argument is given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jobrelay_observability::LogFormat;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "JOBRELAY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file given (pass a path or set {CONFIG_ENV})")]
    MissingPath,

    #[error("unable to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// E-mail gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailConfig {
    pub template: String,
    #[serde(alias = "iplant_email_url")]
    pub gateway_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    pub listen_port: u16,
    pub osm_base_url: String,
    #[serde(default = "default_jobs_bucket")]
    pub jobs_bucket: String,
    #[serde(default = "default_notifications_bucket")]
    pub notifications_bucket: String,
    #[serde(default)]
    pub msg_forward_urls: Vec<String>,
    #[serde(default)]
    pub enable_email: bool,
    #[serde(default)]
    pub email_config: Option<EmailConfig>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: usize,
    #[serde(default = "default_true")]
    pub reconcile_on_startup: bool,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_jobs_bucket() -> String {
    "jobs".to_string()
}

fn default_notifications_bucket() -> String {
    "notifications".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_reconcile_batch_size() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    /// Config file path from the command line (program name already
    /// skipped) or the environment.
    pub fn resolve_path<I>(args: I) -> Result<PathBuf, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        args.into_iter()
            .next()
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingPath)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.osm_base_url)
            .map_err(|e| ConfigError::Invalid(format!("osm_base_url: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "osm_base_url must be http(s), got {}",
                base.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be > 0".into()));
        }
        if self.reconcile_batch_size == 0 {
            return Err(ConfigError::Invalid("reconcile_batch_size must be > 0".into()));
        }
        if self.jobs_bucket.trim().is_empty() || self.notifications_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket names must not be empty".into()));
        }
        if self.enable_email && self.email_config.is_none() {
            return Err(ConfigError::Invalid(
                "email_config is required when enable_email is set".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The e-mail settings in effect (none when e-mail is disabled).
    pub fn active_email(&self) -> Option<&EmailConfig> {
        if self.enable_email {
            self.email_config.as_ref()
        } else {
            None
        }
    }
}
