//! The remote client as seen from the server
//!
//! The server talks back to its client in two ways: blocking requests that
//! need an answer before a build can proceed (`prepareBuild`, the wrapper
//! check) and fire-and-forget notifications (build outcome, output lines).

mod pending;
mod remote;

pub use pending::PendingRequests;
pub use remote::RemoteClient;

use crate::error::ToolingResult;
use crate::messages::{BuildInfo, BuildResult, ClientBuildConfig, WrapperAvailability};
use async_trait::async_trait;

/// Callbacks into the connected client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolingClient: Send + Sync {
    /// Ask the client for build tuning before a build starts
    async fn prepare_build(&self, info: BuildInfo) -> ToolingResult<ClientBuildConfig>;

    /// Ask the client whether the project's wrapper is usable
    async fn check_wrapper_availability(&self) -> ToolingResult<WrapperAvailability>;

    /// A build finished successfully
    fn on_build_successful(&self, result: BuildResult);

    /// A build failed or was cancelled
    fn on_build_failed(&self, result: BuildResult);

    /// One line of build output
    fn on_output(&self, line: String);
}
