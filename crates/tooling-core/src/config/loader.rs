//! Configuration loading

use super::logging_config::LogFormat;
use super::model::ServerConfig;
use crate::error::{ToolingError, ToolingResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "TOOLING_";

/// Individual settings that override the loaded configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub request_timeout_secs: Option<u64>,
    pub lock_timeout_ms: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub stop_daemons_on_shutdown: Option<bool>,
    pub gradle_user_home: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Read overrides from `TOOLING_*` variables through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> ToolingResult<Self> {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            log_level: var("LOG_LEVEL"),
            log_format: parse_var("LOG_FORMAT", var("LOG_FORMAT"))?,
            request_timeout_secs: parse_var("CLIENT_TIMEOUT_SECS", var("CLIENT_TIMEOUT_SECS"))?,
            lock_timeout_ms: parse_var("SYNC_LOCK_TIMEOUT_MS", var("SYNC_LOCK_TIMEOUT_MS"))?,
            idle_timeout_secs: parse_var("IDLE_TIMEOUT_SECS", var("IDLE_TIMEOUT_SECS"))?,
            stop_daemons_on_shutdown: parse_var("STOP_DAEMONS", var("STOP_DAEMONS"))?,
            gradle_user_home: var("GRADLE_USER_HOME").map(PathBuf::from),
        })
    }

    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.client.request_timeout_secs = secs;
        }
        if let Some(ms) = self.lock_timeout_ms {
            config.sync.lock_timeout_ms = ms;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.connection.idle_timeout_secs = Some(secs);
        }
        if let Some(stop) = self.stop_daemons_on_shutdown {
            config.connection.stop_daemons_on_shutdown = stop;
        }
        if let Some(home) = self.gradle_user_home {
            config.connection.gradle_user_home = Some(home);
        }
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> ToolingResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| {
                ToolingError::config(format!("Invalid {}{}='{}': {}", ENV_PREFIX, name, v, e))
            })
        })
        .transpose()
}

/// Source of configuration data
pub enum ConfigSource {
    /// A TOML file
    File(PathBuf),
    /// `TOOLING_*` environment variables
    Environment(Box<dyn Fn(&str) -> Option<String>>),
    /// Command line flags
    CommandLine(ConfigOverrides),
}

/// Configuration loader with support for multiple sources
#[derive(Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    /// Read the process environment
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_env_lookup(self, lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.add_source(ConfigSource::Environment(Box::new(lookup)))
    }

    pub fn with_overrides(self, overrides: ConfigOverrides) -> Self {
        self.add_source(ConfigSource::CommandLine(overrides))
    }

    /// Apply every source in order and validate the result
    pub fn load(self) -> ToolingResult<ServerConfig> {
        let mut config = ServerConfig::default();

        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    debug!("Loading configuration from {}", path.display());
                    let text = std::fs::read_to_string(&path).map_err(|e| {
                        ToolingError::config(format!("Failed to read {}: {}", path.display(), e))
                    })?;
                    config = ServerConfig::from_toml(&text)?;
                }
                ConfigSource::Environment(lookup) => {
                    ConfigOverrides::from_env(lookup)?.apply(&mut config);
                }
                ConfigSource::CommandLine(overrides) => overrides.apply(&mut config),
            }
        }

        config.validate()?;
        Ok(config)
    }
}
