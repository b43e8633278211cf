//! Task execution and cancellation

use super::ToolingServer;
use crate::connection::BuildInvocation;
use crate::error::{ToolingError, ToolingResult};
use crate::failure::FailureReason;
use crate::messages::{
    BuildInfo, BuildRequest, BuildResult, CancellationRequestResult, TaskExecutionResult,
};
use crate::project::validate_project_directory;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

impl ToolingServer {
    /// Run the requested tasks against the live connection.
    ///
    /// Once the request passes the initialization and directory checks,
    /// exactly one of the build success/failure notifications is sent.
    #[instrument(skip(self, request), fields(build_id = %request.build_id, tasks = ?request.task_names))]
    pub async fn execute_tasks(&self, request: BuildRequest) -> ToolingResult<TaskExecutionResult> {
        let _gate = self.enter_build()?;
        let start = Instant::now();

        let (initialized, project_dir, distribution) = {
            let session = self.session.lock();
            (
                session.initialized,
                session.project_dir.clone(),
                session.distribution.clone(),
            )
        };

        if !initialized {
            error!("Cannot execute tasks: {}", FailureReason::ProjectNotInitialized);
            return Ok(TaskExecutionResult::failure(
                FailureReason::ProjectNotInitialized,
            ));
        }

        if let Some(reason) = project_dir.as_deref().and_then(validate_project_directory) {
            error!("Cannot execute tasks: {}", reason);
            return Ok(TaskExecutionResult::failure(reason));
        }

        if distribution.is_none_or(|d| d.is_wrapper()) {
            self.check_wrapper().await;
        }

        let outcome = self.run_tasks(&request).await;
        let result = BuildResult::new(
            request.build_id.clone(),
            request.task_names.clone(),
            start.elapsed(),
        );

        match outcome {
            Ok(()) => {
                info!("Build completed in {}ms", result.duration_ms);
                self.notify_build_successful(result);
                Ok(TaskExecutionResult::Success)
            }
            Err(e) => {
                error!("Build failed: {}", e);
                self.notify_build_failed(result);
                Ok(TaskExecutionResult::failure(FailureReason::classify(&e)))
            }
        }
    }

    async fn run_tasks(&self, request: &BuildRequest) -> ToolingResult<()> {
        let client_config = self
            .prepare_build(BuildInfo::new(
                request.build_id.clone(),
                request.task_names.clone(),
            ))
            .await;

        let connection = self.connections.current().ok_or_else(|| {
            ToolingError::connection_closed("Project connection has not been initialized")
        })?;

        let invocation = BuildInvocation::new(request.task_names.iter().cloned())
            .configure_from(client_config.as_ref(), &request.extra_args);
        debug!("Running {:?}", invocation);

        let ticket = self.cancellation.begin();
        connection
            .run_build(invocation, self.output_sink(), ticket.token())
            .await
    }

    /// Ask the running build to stop. Never waits for the build.
    pub fn cancel_current_build(&self) -> CancellationRequestResult {
        self.cancellation.cancel_current()
    }
}
