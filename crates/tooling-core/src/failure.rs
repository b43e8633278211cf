//! Failure taxonomy reported to the client
//!
//! Every public server operation translates whatever went wrong into one of
//! these reasons. Nothing else crosses the RPC boundary as a failure.

use crate::error::ToolingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a build-like operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ProjectNotFound,
    ProjectNotDirectory,
    ProjectDirectoryInaccessible,
    ProjectNotInitialized,
    BuildFailed,
    BuildCancelled,
    UnsupportedConfiguration,
    UnsupportedBuildToolVersion,
    UnsupportedBuildArgument,
    ConnectionError,
    ConnectionClosed,
    Unknown,
}

impl FailureReason {
    /// Map an error to its failure reason.
    ///
    /// The match is ordered and closed over the build-tool categories of
    /// [`ToolingError`]; everything else is `Unknown`.
    pub fn classify(error: &ToolingError) -> Self {
        match error {
            ToolingError::Build(_) => Self::BuildFailed,
            ToolingError::Cancelled => Self::BuildCancelled,
            ToolingError::UnsupportedConfiguration(_) => Self::UnsupportedConfiguration,
            ToolingError::UnsupportedVersion(_) => Self::UnsupportedBuildToolVersion,
            ToolingError::UnsupportedBuildArgument(_) => Self::UnsupportedBuildArgument,
            ToolingError::Connection(_) => Self::ConnectionError,
            ToolingError::ConnectionClosed(_) => Self::ConnectionClosed,
            _ => Self::Unknown,
        }
    }

    /// Human readable description
    pub fn message(&self) -> &'static str {
        match self {
            Self::ProjectNotFound => "Project directory does not exist",
            Self::ProjectNotDirectory => "Project path is not a directory",
            Self::ProjectDirectoryInaccessible => "Project directory is not readable",
            Self::ProjectNotInitialized => "Project has not been initialized",
            Self::BuildFailed => "Build failed",
            Self::BuildCancelled => "Build was cancelled",
            Self::UnsupportedConfiguration => "Unsupported build configuration",
            Self::UnsupportedBuildToolVersion => "Unsupported Gradle version",
            Self::UnsupportedBuildArgument => "Unsupported build argument",
            Self::ConnectionError => "Unable to communicate with Gradle",
            Self::ConnectionClosed => "Connection to Gradle has been closed",
            Self::Unknown => "Unknown failure",
        }
    }
}

impl From<&ToolingError> for FailureReason {
    fn from(error: &ToolingError) -> Self {
        Self::classify(error)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tool_errors_map_to_matching_reason() {
        let cases = [
            (ToolingError::build("compile"), FailureReason::BuildFailed),
            (ToolingError::Cancelled, FailureReason::BuildCancelled),
            (
                ToolingError::UnsupportedConfiguration("x".into()),
                FailureReason::UnsupportedConfiguration,
            ),
            (
                ToolingError::UnsupportedVersion("4.0".into()),
                FailureReason::UnsupportedBuildToolVersion,
            ),
            (
                ToolingError::UnsupportedBuildArgument("--nope".into()),
                FailureReason::UnsupportedBuildArgument,
            ),
            (ToolingError::connection("refused"), FailureReason::ConnectionError),
            (ToolingError::connection_closed("gone"), FailureReason::ConnectionClosed),
        ];

        for (error, expected) in cases {
            assert_eq!(FailureReason::classify(&error), expected, "{error}");
        }
    }

    #[test]
    fn test_everything_else_is_unknown() {
        assert_eq!(
            FailureReason::classify(&ToolingError::Other("boom".into())),
            FailureReason::Unknown
        );
        assert_eq!(
            FailureReason::classify(&ToolingError::SyncLock("busy".into())),
            FailureReason::Unknown
        );
        assert_eq!(
            FailureReason::classify(&ToolingError::timeout(5)),
            FailureReason::Unknown
        );
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&FailureReason::ProjectNotFound).unwrap();
        assert_eq!(json, "\"PROJECT_NOT_FOUND\"");

        let reason: FailureReason = serde_json::from_str("\"BUILD_CANCELLED\"").unwrap();
        assert_eq!(reason, FailureReason::BuildCancelled);
    }
}
