//! CLI argument definitions using clap

use clap::Parser;
use std::path::PathBuf;
use tooling_core::{ConfigOverrides, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "tooling-server")]
#[command(about = "Gradle tooling server - drives Gradle builds for an editor over JSON-RPC")]
#[command(
    long_about = r#"Gradle tooling server - drives Gradle builds for an editor over JSON-RPC

The server speaks newline-delimited JSON-RPC 2.0 on stdin/stdout and logs to
stderr. It exits after `server/shutdown` or when stdin is closed.

USAGE:
  tooling-server                           # Serve with defaults
  tooling-server --config tooling.toml     # Load settings from a file
  RUST_LOG=debug tooling-server            # Verbose logging"#
)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "TOOLING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Seconds to wait for the client to answer a request
    #[arg(long)]
    pub client_timeout_secs: Option<u64>,

    /// Gradle user home used to locate distributions and stop daemons
    #[arg(long)]
    pub gradle_user_home: Option<PathBuf>,

    /// Leave Gradle daemons running on shutdown
    #[arg(long)]
    pub keep_daemons: bool,
}

impl Cli {
    /// Settings given on the command line, applied over file and environment
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            request_timeout_secs: self.client_timeout_secs,
            gradle_user_home: self.gradle_user_home.clone(),
            stop_daemons_on_shutdown: self.keep_daemons.then_some(false),
            ..ConfigOverrides::default()
        }
    }
}
