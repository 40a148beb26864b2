//! Runtime configuration loaded from TOML with environment overrides.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Overrides are read from `BOARDSYNC_BACKEND_URL`,
//! `BOARDSYNC_BACKEND_TOKEN`, `BOARDSYNC_GITHUB_TOKEN`,
//! `BOARDSYNC_GITHUB_API`, `DATABASE_URL` and `BOARDSYNC_LOG`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sync::{
    adapters::http::DEFAULT_GITHUB_API,
    domain::{MergeRetryPolicy, PollPolicy, duration_secs},
    services::{DEFAULT_OPTIMISTIC_WINDOW, IssueBodyTemplate, SyncError},
};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML.
    #[error("invalid configuration: {0}")]
    Parse(#[source] Box<toml::de::Error>),

    /// A value required by the requested operation is absent.
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    /// The issue body template does not compile.
    #[error(transparent)]
    Template(#[from] SyncError),
}

/// Collaboration backend connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend REST API.
    pub url: String,
    /// Bearer token.
    pub token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_owned(),
            token: None,
        }
    }
}

/// GitHub REST API connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// API root.
    pub api_base: String,
    /// Bearer token.
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_owned(),
            token: None,
        }
    }
}

/// Mapping database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `PostgreSQL` URL; mappings stay in memory when absent.
    pub url: Option<String>,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 8,
        }
    }
}

/// HTTP client settings shared by remote adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Upper bound for one request, in seconds.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConflictConfig {
    /// How long a resolved file stays hidden while GitHub still lists it.
    #[serde(with = "duration_secs")]
    pub optimistic_window: Duration,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            optimistic_window: DEFAULT_OPTIMISTIC_WINDOW
                .to_std()
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl ConflictConfig {
    /// Returns the window as a calendar duration.
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.optimistic_window).unwrap_or(DEFAULT_OPTIMISTIC_WINDOW)
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardsyncConfig {
    /// Collaboration backend.
    pub backend: BackendConfig,
    /// GitHub API.
    pub github: GitHubConfig,
    /// Mapping database.
    pub database: DatabaseConfig,
    /// HTTP clients.
    pub http: HttpConfig,
    /// Merge retries.
    pub merge: MergeRetryPolicy,
    /// Mergeability polling.
    pub poll: PollPolicy,
    /// Conflict resolution.
    pub conflicts: ConflictConfig,
    /// Issue body template; the task description verbatim when absent.
    pub issue_body_template: Option<String>,
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log: Option<String>,
}

impl BoardsyncConfig {
    /// Parses configuration TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|err| ConfigError::Parse(Box::new(err)))
    }

    /// Loads `path` when given, then applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] for an
    /// unusable file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(file) => {
                let source = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
                    path: file.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&source)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup`, ignoring blank values.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).map(|raw| raw.trim().to_owned()).filter(|v| !v.is_empty());
        if let Some(url) = value("BOARDSYNC_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(token) = value("BOARDSYNC_BACKEND_TOKEN") {
            self.backend.token = Some(token);
        }
        if let Some(token) = value("BOARDSYNC_GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(api_base) = value("BOARDSYNC_GITHUB_API") {
            self.github.api_base = api_base;
        }
        if let Some(url) = value("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(log) = value("BOARDSYNC_LOG") {
            self.log = Some(log);
        }
    }

    /// Returns the log directive, `info` by default.
    #[must_use]
    pub fn log_directive(&self) -> &str {
        self.log.as_deref().unwrap_or("info")
    }

    /// Compiles the configured issue body template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Template`] when the template does not compile.
    pub fn issue_template(&self) -> Result<IssueBodyTemplate, ConfigError> {
        Ok(self
            .issue_body_template
            .as_deref()
            .map(IssueBodyTemplate::new)
            .transpose()?
            .unwrap_or_default())
    }

    /// Returns the backend token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no token is configured.
    pub fn backend_token(&self) -> Result<&str, ConfigError> {
        self.backend
            .token
            .as_deref()
            .ok_or(ConfigError::Missing("backend.token"))
    }

    /// Returns the GitHub token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no token is configured.
    pub fn github_token(&self) -> Result<&str, ConfigError> {
        self.github
            .token
            .as_deref()
            .ok_or(ConfigError::Missing("github.token"))
    }
}
