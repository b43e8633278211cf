//! The tooling server
//!
//! [`ToolingServer`] owns all process-wide state: the connection, the
//! cancellation slot, the session flags and the connected client. Each piece
//! sits behind its own lock so that metadata queries, cancellation and
//! shutdown never wait behind a running build.
//!
//! Build-like operations (`initialize` and `executeTasks`) pass through a
//! single-flight gate first. A second one arriving while the gate is held is
//! rejected immediately.

mod dispatch;
mod execute;
mod initialize;
mod lifecycle;
mod run;

#[cfg(test)]
mod tests;

pub use dispatch::handle_request;
pub use run::serve;

use crate::cancellation::CancellationController;
use crate::client::ToolingClient;
use crate::config::ServerConfig;
use crate::connection::{ConnectionManager, ConnectorFactory, OutputSink};
use crate::error::{ToolingError, ToolingResult};
use crate::messages::{
    BuildDistribution, BuildInfo, BuildResult, ClientBuildConfig, InitializeParams, ServerMetadata,
};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

#[derive(Default)]
struct SessionState {
    initialized: bool,
    /// Directory and distribution of the most recent connection
    project_dir: Option<PathBuf>,
    distribution: Option<BuildDistribution>,
    /// Parameters of the last initialization that completed
    last_params: Option<InitializeParams>,
}

/// Build orchestration server
pub struct ToolingServer {
    config: ServerConfig,
    connections: ConnectionManager,
    cancellation: CancellationController,
    client: RwLock<Option<Arc<dyn ToolingClient>>>,
    session: Mutex<SessionState>,
    build_in_progress: AtomicBool,
    shut_down: AtomicBool,
    shutdown_token: CancellationToken,
}

impl ToolingServer {
    pub fn new(config: ServerConfig, factory: Arc<dyn ConnectorFactory>) -> Self {
        let connections = ConnectionManager::new(factory).with_idle_timeout(config.idle_timeout());

        Self {
            config,
            connections,
            cancellation: CancellationController::new(),
            client: RwLock::new(None),
            session: Mutex::new(SessionState::default()),
            build_in_progress: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Attach the client that receives callbacks and notifications
    pub fn connect(&self, client: Arc<dyn ToolingClient>) {
        *self.client.write() = Some(client);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metadata(&self) -> ServerMetadata {
        ServerMetadata::current()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.lock().initialized
    }

    /// Whether a build tool connection is currently held
    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    pub fn is_build_in_progress(&self) -> bool {
        self.build_in_progress.load(Ordering::SeqCst)
    }

    /// Fired once the server has shut down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    fn client(&self) -> Option<Arc<dyn ToolingClient>> {
        self.client.read().clone()
    }

    fn enter_build(&self) -> ToolingResult<BuildGate<'_>> {
        if self
            .build_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            error!("Cannot run build, build is already in progress");
            return Err(ToolingError::BuildInProgress);
        }

        Ok(BuildGate {
            flag: &self.build_in_progress,
        })
    }

    /// Out-of-band wrapper check. Failures are only logged.
    async fn check_wrapper(&self) {
        let Some(client) = self.client() else {
            return;
        };

        match client.check_wrapper_availability().await {
            Ok(availability) if availability.is_available => {
                debug!("Gradle wrapper is available");
            }
            Ok(_) => warn!("Gradle wrapper is not available"),
            Err(e) => warn!("Failed to check Gradle wrapper availability: {}", e),
        }
    }

    /// Tell the client a build is starting and collect its tuning
    async fn prepare_build(&self, info: BuildInfo) -> Option<ClientBuildConfig> {
        let client = self.client()?;

        match client.prepare_build(info).await {
            Ok(config) => {
                debug!("Client build config: {:?}", config);
                Some(config)
            }
            Err(e) => {
                warn!("Client did not provide a build config: {}", e);
                None
            }
        }
    }

    fn output_sink(&self) -> OutputSink {
        match self.client() {
            Some(client) => OutputSink::new(move |line| client.on_output(line.to_string())),
            None => OutputSink::discard(),
        }
    }

    fn notify_build_successful(&self, result: BuildResult) {
        if let Some(client) = self.client() {
            client.on_build_successful(result);
        }
    }

    fn notify_build_failed(&self, result: BuildResult) {
        if let Some(client) = self.client() {
            client.on_build_failed(result);
        }
    }
}

/// Holds the single-flight flag; releases it when dropped
struct BuildGate<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BuildGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
