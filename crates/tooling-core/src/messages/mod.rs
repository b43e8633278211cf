//! Request, result and event payloads exchanged with the client
//!
//! All payloads use camelCase field names on the wire.

mod params;
mod results;

pub use params::{
    BuildDistribution, BuildId, BuildInfo, BuildRequest, ClientBuildConfig, InitializeParams,
};
pub use results::{
    BuildResult, CancellationFailure, CancellationRequestResult, InitializeResult,
    ServerMetadata, TaskExecutionResult, WrapperAvailability,
};
