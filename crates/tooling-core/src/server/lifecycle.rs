//! Shutdown

use super::{SessionState, ToolingServer};
use std::sync::atomic::Ordering;
use tracing::info;

impl ToolingServer {
    /// Cancel any build, release the connection, stop daemons and clear all
    /// session state. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down tooling server");

        if self.cancellation.cancel_and_clear() {
            info!("Cancelled running build");
        }

        let handle = self.connections.take();
        *self.session.lock() = SessionState::default();
        *self.client.write() = None;

        if let Some(handle) = handle {
            info!("Closing connection");
            handle.release();
        }

        if self.config.connection.stop_daemons_on_shutdown {
            info!("Stopping Gradle daemons");
            self.connections.stop_daemons().await;
        }

        self.shutdown_token.cancel();
        info!("Shutdown complete");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
