//! Client configuration.

use std::path::{Path, PathBuf};

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable overriding the server URL.
pub const SERVER_URL_ENV: &str = "MATHS_GUESS_SERVER_URL";

/// Environment variable overriding the session file path.
pub const SESSION_FILE_ENV: &str = "MATHS_GUESS_SESSION_FILE";

/// Where the client finds the game service and keeps its session id.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the game service.
    #[serde(default = "default_server_url")]
    server_url: String,

    /// File holding the persisted session id.
    #[serde(default = "default_session_file")]
    session_file: PathBuf,
}

#[instrument]
fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

#[instrument]
fn default_session_file() -> PathBuf {
    PathBuf::from(".maths_guess").join("session.json")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            session_file: default_session_file(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration from explicit values.
    #[instrument(skip(server_url, session_file))]
    pub fn new(server_url: impl Into<String>, session_file: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            session_file: session_file.into(),
        }
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(server_url = %config.server_url, "Config loaded successfully");
        Ok(config)
    }

    /// Resolves configuration: file (if it exists), then environment, then
    /// explicit overrides.
    #[instrument]
    pub fn resolve(
        config_path: Option<&Path>,
        server_url: Option<String>,
        session_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(url) = server_url {
            debug!(url = %url, "Overriding server URL");
            config.server_url = url;
        }
        if let Some(path) = session_file {
            debug!(path = %path.display(), "Overriding session file");
            config.session_file = path;
        }

        if config.server_url.trim().is_empty() {
            return Err(ConfigError::new("Server URL must not be empty".to_string()));
        }

        Ok(config)
    }

    /// Applies overrides from an environment lookup.
    #[instrument(skip(self, lookup))]
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "Server URL from environment");
            self.server_url = url;
        }
        if let Some(path) = lookup(SESSION_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(path = %path, "Session file from environment");
            self.session_file = PathBuf::from(path);
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
