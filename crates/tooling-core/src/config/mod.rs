//! Server configuration
//!
//! Defaults, then an optional TOML file, then `TOOLING_*` environment
//! variables, then command line flags.

mod loader;
mod logging_config;
mod model;

pub use loader::{ConfigLoader, ConfigOverrides, ConfigSource, ENV_PREFIX};
pub use logging_config::{LogFormat, LoggingConfig};
pub use model::{ClientConfig, ConnectionConfig, ServerConfig, SyncConfig};
