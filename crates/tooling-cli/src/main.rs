//! Gradle tooling server
//!
//! Serves one editor client over newline-delimited JSON-RPC on stdin/stdout.
//!
//! # Installation
//!
//! ```bash
//! cargo install --path crates/tooling-cli
//! ```
//!
//! # Configuration
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. The TOML file given with `--config`
//! 3. `TOOLING_*` environment variables
//! 4. Command line flags
//!
//! `RUST_LOG` overrides the configured log level.

mod args;
mod logging;
mod signal_handler;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tooling_core::{ConfigLoader, GradleConnectorFactory, ToolingServer, serve};
use tracing::info;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader
        .with_env()
        .with_overrides(cli.overrides())
        .load()
        .context("Invalid configuration")?;

    logging::init(&config.logging);
    info!(
        "Starting tooling server {} (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );

    let factory = Arc::new(GradleConnectorFactory::new(
        config.connection.gradle_user_home.as_deref(),
    ));
    let server = Arc::new(ToolingServer::new(config, factory));

    let _signals = signal_handler::install(Arc::clone(&server));

    serve(server, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("Server loop failed")?;

    // The stdin reader thread blocks until input arrives and cannot be
    // cancelled, so leave without waiting for the runtime to wind down
    std::process::exit(0);
}
