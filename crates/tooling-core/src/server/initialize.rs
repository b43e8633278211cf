//! Project initialization

use super::ToolingServer;
use crate::connection::BuildInvocation;
use crate::error::ToolingResult;
use crate::failure::FailureReason;
use crate::messages::{BuildId, BuildInfo, BuildResult, InitializeParams, InitializeResult};
use crate::project::{sync, validate_project_directory};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

impl ToolingServer {
    /// Open the project in `params` and make sure its model cache is fresh.
    ///
    /// Only a single-flight violation is returned as `Err`; every other
    /// failure becomes `InitializeResult::Failure`.
    #[instrument(skip(self, params), fields(project = %params.project_directory.display(), build_id = ?params.build_id))]
    pub async fn initialize(&self, params: InitializeParams) -> ToolingResult<InitializeResult> {
        let _gate = self.enter_build()?;
        let start = Instant::now();
        let build_id = params.build_id.clone().unwrap_or_else(BuildId::generate);

        match self.do_initialize(&params, &build_id, start).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Failed to initialize project: {}", e);
                self.notify_build_failed(BuildResult::new(
                    build_id,
                    Vec::new(),
                    start.elapsed(),
                ));
                Ok(InitializeResult::failure(FailureReason::classify(&e)))
            }
        }
    }

    async fn do_initialize(
        &self,
        params: &InitializeParams,
        build_id: &BuildId,
        start: Instant,
    ) -> ToolingResult<InitializeResult> {
        debug!("Initializing project with {:?}", params);

        if params.build_distribution.is_wrapper() {
            self.check_wrapper().await;
        }

        if self.cancellation.is_active() {
            info!("Cancelling the running build before reinitializing");
            self.cancellation.cancel_current();
        }

        let project_dir = &params.project_directory;
        if let Some(reason) = validate_project_directory(project_dir) {
            error!("Cannot initialize project: {}", reason);
            return Ok(InitializeResult::failure(reason));
        }

        let reinitializing = self.connections.has_live_connection()
            && self.session.lock().last_params.as_ref() == Some(params);
        if reinitializing {
            info!("Project is being reinitialized, reusing connection");
        }

        let connection =
            self.connections
                .get_or_connect(project_dir, !reinitializing, &params.build_distribution)?;

        {
            let mut session = self.session.lock();
            session.initialized = true;
            session.project_dir = Some(project_dir.clone());
            session.distribution = Some(params.build_distribution.clone());
        }

        let cache_file = sync::cache_file_for_project(project_dir);

        if self.needs_sync(params).await? {
            info!("Synchronizing project model");

            let ticket = self.cancellation.begin();
            let client_config = self
                .prepare_build(BuildInfo::new(build_id.clone(), Vec::new()))
                .await;
            let invocation = BuildInvocation::default().configure_from(client_config.as_ref(), &[]);

            let model = connection
                .fetch_model(invocation, self.output_sink(), ticket.token())
                .await?;
            drop(ticket);

            let dir = project_dir.clone();
            let lock_timeout = self.config.lock_timeout();
            tokio::task::spawn_blocking(move || {
                sync::write_sync_artifacts(&dir, &model, lock_timeout)
            })
            .await??;

            self.notify_build_successful(BuildResult::new(
                build_id.clone(),
                Vec::new(),
                start.elapsed(),
            ));
        } else {
            debug!("Project model cache is up to date");
        }

        self.session.lock().last_params = Some(params.clone());
        Ok(InitializeResult::success(cache_file))
    }

    async fn needs_sync(&self, params: &InitializeParams) -> ToolingResult<bool> {
        if params.needs_full_sync {
            return Ok(true);
        }

        let dir: PathBuf = params.project_directory.clone();
        let needed = tokio::task::spawn_blocking(move || {
            !sync::are_sync_files_readable(&dir) || sync::check_sync_needed(&dir)
        })
        .await?;
        Ok(needed)
    }
}
