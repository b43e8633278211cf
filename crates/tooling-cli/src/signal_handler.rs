//! Shut the server down on SIGINT/SIGTERM

use std::sync::Arc;
use tokio::task::JoinHandle;
use tooling_core::ToolingServer;
use tracing::{info, warn};

/// Handle to the signal listening task; stops listening when dropped
pub struct SignalHandler {
    task_handle: Option<JoinHandle<()>>,
}

impl SignalHandler {
    /// Start listening. The first signal shuts `server` down, which ends the
    /// serve loop.
    #[cfg(unix)]
    pub fn start(server: Arc<ToolingServer>) -> std::io::Result<Self> {
        use futures::stream::StreamExt;
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook_tokio::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = tokio::spawn(async move {
            if let Some(signal) = signals.next().await {
                let name = if signal == SIGINT { "SIGINT" } else { "SIGTERM" };
                info!("Received {}, shutting down", name);
                server.shutdown().await;
            }
        });

        Ok(Self {
            task_handle: Some(handle),
        })
    }

    #[cfg(not(unix))]
    pub fn start(server: Arc<ToolingServer>) -> std::io::Result<Self> {
        let handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    server.shutdown().await;
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });

        Ok(Self {
            task_handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the handler, logging instead of failing when signals are unavailable
pub fn install(server: Arc<ToolingServer>) -> Option<SignalHandler> {
    match SignalHandler::start(server) {
        Ok(handler) => Some(handler),
        Err(e) => {
            warn!("Failed to install signal handler: {}", e);
            None
        }
    }
}
