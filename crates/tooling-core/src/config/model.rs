//! Configuration model

use super::logging_config::LoggingConfig;
use crate::error::{ToolingError, ToolingResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for requests sent to the client (5 minutes)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Default wait for the per-project sync lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for `prepareBuild` and the wrapper check
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub lock_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Drop a connection unused for this long. Unset keeps it forever.
    pub idle_timeout_secs: Option<u64>,
    pub stop_daemons_on_shutdown: bool,
    /// Overrides `GRADLE_USER_HOME`
    pub gradle_user_home: Option<PathBuf>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            stop_daemons_on_shutdown: true,
            gradle_user_home: None,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub logging: LoggingConfig,
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub connection: ConnectionConfig,
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> ToolingResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> ToolingResult<()> {
        self.logging.validate()?;

        if self.client.request_timeout_secs == 0 {
            return Err(ToolingError::config(
                "client.request_timeout_secs must be greater than zero",
            ));
        }

        if self.sync.lock_timeout_ms == 0 {
            return Err(ToolingError::config(
                "sync.lock_timeout_ms must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.lock_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.connection.idle_timeout_secs.map(Duration::from_secs)
    }
}
