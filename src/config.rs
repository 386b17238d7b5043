//! User settings - `~/.config/appflow/config.toml`
//!
//! Every field is optional; a missing file means defaults. Command-line
//! flags and `APPFLOW_*` environment variables win over the file.
//!
//! ```toml
//! server = "https://cluster.example:6443"
//! namespace = "staging"
//! token_file = "~/.kube/token"
//! jobs = 4
//!
//! [retry]
//! max_attempts = 5
//!
//! [poll]
//! interval_ms = 500
//! max_polls = 600
//! ```

use anyhow::{Context, Result};
use cluster::Client;
use cluster::backend::http::HttpConfig;
use orchestrator::{ExecuteOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("appflow"))
}

/// Default config file location
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API base URL
    pub server: String,
    pub namespace: String,
    /// Bearer token
    pub token: Option<String>,
    /// File holding the bearer token, `~` expanded
    pub token_file: Option<String>,
    pub timeout_secs: u64,
    /// Worker pool width; 0 gives every resource its own worker
    pub jobs: usize,
    pub retry: RetrySettings,
    pub poll: PollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8001".to_string(),
            namespace: "default".to_string(),
            token: None,
            token_file: None,
            timeout_secs: 30,
            jobs: 0,
            retry: RetrySettings::default(),
            poll: PollSettings::default(),
        }
    }
}

/// Retries of transient API failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

/// Readiness polling cadence and budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            backoff_factor: 1.5,
            max_interval_ms: 15_000,
            max_polls: 300,
        }
    }
}

/// Values given on the command line (or through `APPFLOW_*` variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub namespace: Option<String>,
    pub token: Option<String>,
    pub jobs: Option<usize>,
}

impl Settings {
    /// Load settings
    ///
    /// An explicit `path` must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_path()?, false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(namespace) = overrides.namespace {
            self.namespace = namespace;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        self
    }

    /// Bearer token, read from `token_file` when not given inline
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        let Some(file) = &self.token_file else {
            return Ok(None);
        };
        let path = PathBuf::from(shellexpand::tilde(file).as_ref());
        let token = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read token file: {}", path.display()))?;
        Ok(Some(token.trim().to_string()))
    }

    pub fn http_config(&self) -> Result<HttpConfig> {
        Ok(HttpConfig {
            server: self.server.clone(),
            token: self.resolve_token()?,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    /// Cluster client for the configured server and namespace
    pub fn client(&self) -> Result<Client> {
        Ok(Client::http(self.http_config()?, self.namespace.clone()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn poll_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.poll.max_polls,
            base_delay: Duration::from_millis(self.poll.interval_ms),
            backoff_factor: self.poll.backoff_factor,
            max_delay: Duration::from_millis(self.poll.max_interval_ms),
        }
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            jobs: (self.jobs > 0).then_some(self.jobs),
            retry: self.retry_config(),
            poll: self.poll_config(),
        }
    }
}
