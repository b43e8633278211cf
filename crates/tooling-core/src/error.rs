//! Error types for the tooling server

use thiserror::Error;

/// Result type alias for tooling server operations
pub type ToolingResult<T> = Result<T, ToolingError>;

/// Main error type for the tooling server
///
/// The build-tool variants (`Build` through `ConnectionClosed`) form the closed
/// set of external-tool error categories. They are mapped to a
/// [`FailureReason`](crate::failure::FailureReason) before anything crosses the
/// RPC boundary.
#[derive(Error, Debug, Clone)]
pub enum ToolingError {
    /// The build tool reported a build error
    #[error("Build failed: {0}")]
    Build(String),

    /// The build was cancelled cooperatively
    #[error("Build was cancelled")]
    Cancelled,

    /// The build tool rejected the operation configuration
    #[error("Unsupported operation configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The build tool version cannot run the requested operation
    #[error("Unsupported Gradle version: {0}")]
    UnsupportedVersion(String),

    /// The build tool rejected a command-line argument
    #[error("Unsupported build argument: {0}")]
    UnsupportedBuildArgument(String),

    /// Transport-level failure while talking to the build tool
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted after the connection was torn down
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// A build-like operation is already running
    #[error("Build is already in progress")]
    BuildInProgress,

    /// The per-project sync lock could not be acquired
    #[error("Sync lock error: {0}")]
    SyncLock(String),

    /// The remote client failed to answer a request
    #[error("Client error: {0}")]
    Client(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A request to the client timed out
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// A background task panicked or was cancelled
    #[error("Error: {0}")]
    Other(String),
}

impl ToolingError {
    /// Create a new build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new connection-closed error
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::ConnectionClosed(message.into())
    }

    /// Create a new client error
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new timeout error
    pub const fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }
}

impl From<std::io::Error> for ToolingError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ToolingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<toml::de::Error> for ToolingError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ToolingError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Other(format!("Background task failed: {}", error))
    }
}
