//! Results returned to the client

use super::params::BuildId;
use crate::failure::FailureReason;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of `initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InitializeResult {
    Success { cache_file: PathBuf },
    Failure { reason: FailureReason },
}

impl InitializeResult {
    pub fn success(cache_file: impl Into<PathBuf>) -> Self {
        Self::Success {
            cache_file: cache_file.into(),
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(*reason),
        }
    }
}

/// Outcome of `executeTasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskExecutionResult {
    Success,
    Failure { reason: FailureReason },
}

impl TaskExecutionResult {
    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success => None,
            Self::Failure { reason } => Some(*reason),
        }
    }
}

/// Why a cancellation request was not enqueued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "message",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum CancellationFailure {
    NoRunningBuild,
    CancellationError(String),
}

/// Outcome of `cancelCurrentBuild`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequestResult {
    pub was_enqueued: bool,
    pub failure_reason: Option<CancellationFailure>,
}

impl CancellationRequestResult {
    pub fn enqueued() -> Self {
        Self {
            was_enqueued: true,
            failure_reason: None,
        }
    }

    pub fn no_running_build() -> Self {
        Self {
            was_enqueued: false,
            failure_reason: Some(CancellationFailure::NoRunningBuild),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            was_enqueued: false,
            failure_reason: Some(CancellationFailure::CancellationError(message.into())),
        }
    }
}

/// Payload of the build success/failure notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub build_id: BuildId,
    pub tasks: Vec<String>,
    pub duration_ms: u64,
}

impl BuildResult {
    pub fn new(build_id: BuildId, tasks: Vec<String>, duration: Duration) -> Self {
        Self {
            build_id,
            tasks,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Answer to `checkGradleWrapperAvailability`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperAvailability {
    pub is_available: bool,
}

/// Static identity of the server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetadata {
    pub process_id: u32,
}

impl ServerMetadata {
    pub fn current() -> Self {
        Self {
            process_id: std::process::id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_result_wire_format() {
        let value = serde_json::to_value(InitializeResult::success("/proj/.tooling/model.json"))
            .unwrap();
        assert_eq!(
            value,
            json!({"status": "success", "cacheFile": "/proj/.tooling/model.json"})
        );

        let value =
            serde_json::to_value(InitializeResult::failure(FailureReason::ProjectNotFound))
                .unwrap();
        assert_eq!(
            value,
            json!({"status": "failure", "reason": "PROJECT_NOT_FOUND"})
        );
    }

    #[test]
    fn test_task_result_wire_format() {
        assert_eq!(
            serde_json::to_value(TaskExecutionResult::Success).unwrap(),
            json!({"status": "success"})
        );

        let failure: TaskExecutionResult =
            serde_json::from_value(json!({"status": "failure", "reason": "BUILD_FAILED"}))
                .unwrap();
        assert_eq!(failure.failure_reason(), Some(FailureReason::BuildFailed));
    }

    #[test]
    fn test_cancellation_result_wire_format() {
        assert_eq!(
            serde_json::to_value(CancellationRequestResult::no_running_build()).unwrap(),
            json!({"wasEnqueued": false, "failureReason": {"type": "NO_RUNNING_BUILD"}})
        );
        assert_eq!(
            serde_json::to_value(CancellationRequestResult::error("boom")).unwrap(),
            json!({
                "wasEnqueued": false,
                "failureReason": {"type": "CANCELLATION_ERROR", "message": "boom"}
            })
        );
        assert_eq!(
            serde_json::to_value(CancellationRequestResult::enqueued()).unwrap(),
            json!({"wasEnqueued": true, "failureReason": null})
        );
    }

    #[test]
    fn test_build_result_duration() {
        let result = BuildResult::new(
            BuildId::new("b"),
            vec!["assembleDebug".into()],
            Duration::from_millis(1500),
        );
        assert_eq!(result.duration_ms, 1500);
    }
}
