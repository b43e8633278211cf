//! Connection to the external build tool
//!
//! A [`ConnectorFactory`] configures a [`Connector`] for one project
//! directory and distribution; the connector opens a [`ProjectConnection`],
//! the live session builds and model fetches run against. The
//! [`ConnectionManager`] owns at most one connector/connection pair at a time.

pub mod gradle;
mod invocation;
mod manager;

pub use invocation::{BuildInvocation, OutputSink};
pub use manager::{ConnectionHandle, ConnectionManager};

use crate::error::ToolingResult;
use crate::messages::BuildDistribution;
use crate::project::ProjectModel;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A live session with the build tool for one project
#[async_trait]
pub trait ProjectConnection: Send + Sync {
    /// Identity of this connection, unique within the process
    fn id(&self) -> u64;

    /// Run the invocation's tasks. Firing `cancel` stops the build and
    /// yields [`ToolingError::Cancelled`](crate::error::ToolingError::Cancelled).
    async fn run_build(
        &self,
        invocation: BuildInvocation,
        output: OutputSink,
        cancel: CancellationToken,
    ) -> ToolingResult<()>;

    /// Ask the build tool to describe the project structure
    async fn fetch_model(
        &self,
        invocation: BuildInvocation,
        output: OutputSink,
        cancel: CancellationToken,
    ) -> ToolingResult<ProjectModel>;

    /// Release the session. Later calls fail with `ConnectionClosed`.
    fn close(&self);
}

/// Configured entry point for opening connections to one project
pub trait Connector: Send + Sync {
    fn connect(&self) -> ToolingResult<Arc<dyn ProjectConnection>>;

    /// Release every resource held by this connector
    fn disconnect(&self);
}

/// Creates connectors and manages build tool processes that outlive them
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    fn new_connector(
        &self,
        project_dir: &Path,
        distribution: &BuildDistribution,
    ) -> ToolingResult<Box<dyn Connector>>;

    /// Stop pooled build daemons started through this factory
    async fn stop_daemons(&self);
}
