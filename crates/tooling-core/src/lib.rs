//! Gradle tooling server core library
//!
//! A long-lived server that owns the connection to a Gradle build, serves
//! initialize/execute/cancel requests from a single client over JSON-RPC, and
//! guarantees that only one build runs at a time.

pub mod cancellation;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod failure;
pub mod messages;
pub mod project;
pub mod protocol;
pub mod server;
pub mod testing;
pub mod transport;

// Re-export commonly used types
pub use cancellation::{BuildTicket, CancelSignal, CancellationController};
pub use client::{RemoteClient, ToolingClient};
pub use config::{ConfigLoader, ConfigOverrides, LogFormat, ServerConfig};
pub use connection::gradle::GradleConnectorFactory;
pub use connection::{
    BuildInvocation, ConnectionManager, Connector, ConnectorFactory, OutputSink,
    ProjectConnection,
};
pub use error::{ToolingError, ToolingResult};
pub use failure::FailureReason;
pub use messages::*;
pub use project::{ProjectModel, ProjectNode, validate_project_directory};
pub use server::{ToolingServer, serve};
