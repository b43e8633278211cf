//! Ownership of the single live connection

use super::{Connector, ConnectorFactory, ProjectConnection};
use crate::error::ToolingResult;
use crate::messages::BuildDistribution;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A connector together with the connection it opened
pub struct ConnectionHandle {
    connector: Box<dyn Connector>,
    connection: Arc<dyn ProjectConnection>,
    project_dir: PathBuf,
    last_used: Instant,
}

impl ConnectionHandle {
    pub fn connection(&self) -> Arc<dyn ProjectConnection> {
        Arc::clone(&self.connection)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Close the connection and dispose of the connector
    pub fn release(self) {
        debug!(
            "Releasing connection {} for {}",
            self.connection.id(),
            self.project_dir.display()
        );
        self.connection.close();
        self.connector.disconnect();
    }

    fn is_idle(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }
}

/// Owns at most one connector/connection pair and decides when to reuse it
pub struct ConnectionManager {
    factory: Arc<dyn ConnectorFactory>,
    slot: Mutex<Option<ConnectionHandle>>,
    idle_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ConnectorFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            idle_timeout: None,
        }
    }

    /// Treat a connection unused for longer than `timeout` as gone
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Return the live connection, or open a new one.
    ///
    /// Without `force_connect` an existing connection is returned untouched.
    /// With it, the previous connector is released before a new one is
    /// configured for `distribution` and connected.
    pub fn get_or_connect(
        &self,
        project_dir: &Path,
        force_connect: bool,
        distribution: &BuildDistribution,
    ) -> ToolingResult<Arc<dyn ProjectConnection>> {
        let mut slot = self.slot.lock();

        if !force_connect {
            if let Some(handle) = slot.as_mut().filter(|h| !h.is_idle(self.idle_timeout)) {
                handle.last_used = Instant::now();
                debug!("Reusing connection {}", handle.connection.id());
                return Ok(handle.connection());
            }
        }

        if let Some(previous) = slot.take() {
            previous.release();
        }

        let connector = self.factory.new_connector(project_dir, distribution)?;
        let connection = match connector.connect() {
            Ok(connection) => connection,
            Err(e) => {
                connector.disconnect();
                return Err(e);
            }
        };
        info!(
            "Connected to {} (connection {})",
            project_dir.display(),
            connection.id()
        );

        *slot = Some(ConnectionHandle {
            connector,
            connection: Arc::clone(&connection),
            project_dir: project_dir.to_path_buf(),
            last_used: Instant::now(),
        });

        Ok(connection)
    }

    /// Whether a connection exists that would be reused
    pub fn has_live_connection(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_idle(self.idle_timeout))
    }

    /// Whether any connection is held, idle or not
    pub fn is_connected(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// The current connection, marking it used
    pub fn current(&self) -> Option<Arc<dyn ProjectConnection>> {
        let mut slot = self.slot.lock();
        let handle = slot.as_mut()?;
        handle.last_used = Instant::now();
        Some(handle.connection())
    }

    /// Remove the handle from the manager, leaving it empty
    pub fn take(&self) -> Option<ConnectionHandle> {
        self.slot.lock().take()
    }

    pub async fn stop_daemons(&self) {
        self.factory.stop_daemons().await;
    }
}
