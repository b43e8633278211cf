//! Gradle driven through its command line client

mod distribution;
mod model;
mod process;

pub use distribution::{ExecutableResolver, gradle_user_home};
pub use process::classify_failure;

use super::{BuildInvocation, Connector, ConnectorFactory, OutputSink, ProjectConnection};
use crate::error::{ToolingError, ToolingResult};
use crate::messages::BuildDistribution;
use crate::project::ProjectModel;
use crate::project::sync::CACHE_DIR;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Creates [`GradleConnector`]s and remembers every executable they used
pub struct GradleConnectorFactory {
    resolver: ExecutableResolver,
    used: Arc<Mutex<BTreeSet<(PathBuf, PathBuf)>>>,
}

impl GradleConnectorFactory {
    pub fn new(gradle_user_home: Option<&Path>) -> Self {
        Self {
            resolver: ExecutableResolver::new(distribution::gradle_user_home(gradle_user_home)),
            used: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }
}

#[async_trait]
impl ConnectorFactory for GradleConnectorFactory {
    fn new_connector(
        &self,
        project_dir: &Path,
        distribution: &BuildDistribution,
    ) -> ToolingResult<Box<dyn Connector>> {
        let executable = self.resolver.resolve(project_dir, distribution);
        debug!(
            "Using {} for {}",
            executable.display(),
            project_dir.display()
        );

        self.used
            .lock()
            .insert((executable.clone(), project_dir.to_path_buf()));

        Ok(Box::new(GradleConnector {
            project_dir: project_dir.to_path_buf(),
            executable,
            connections: Mutex::new(Vec::new()),
        }))
    }

    async fn stop_daemons(&self) {
        let used: Vec<_> = self.used.lock().iter().cloned().collect();

        for (executable, project_dir) in used {
            let mut command = Command::new(&executable);
            command
                .arg("--stop")
                .current_dir(&project_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);

            match tokio::time::timeout(STOP_TIMEOUT, command.status()).await {
                Ok(Ok(status)) if status.success() => {
                    info!("Stopped Gradle daemons ({})", executable.display());
                }
                Ok(Ok(status)) => warn!(
                    "{} --stop exited with {}",
                    executable.display(),
                    status
                ),
                Ok(Err(e)) => warn!("Failed to run {} --stop: {}", executable.display(), e),
                Err(_) => warn!("{} --stop timed out", executable.display()),
            }
        }
    }
}

/// Opens [`GradleConnection`]s for one project and executable
pub struct GradleConnector {
    project_dir: PathBuf,
    executable: PathBuf,
    connections: Mutex<Vec<Arc<AtomicBool>>>,
}

impl Connector for GradleConnector {
    fn connect(&self) -> ToolingResult<Arc<dyn ProjectConnection>> {
        let closed = Arc::new(AtomicBool::new(false));
        self.connections.lock().push(Arc::clone(&closed));

        Ok(Arc::new(GradleConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            project_dir: self.project_dir.clone(),
            executable: self.executable.clone(),
            closed,
        }))
    }

    fn disconnect(&self) {
        for closed in self.connections.lock().drain(..) {
            closed.store(true, Ordering::SeqCst);
        }
    }
}

/// A session that runs each request as a Gradle client process
pub struct GradleConnection {
    id: u64,
    project_dir: PathBuf,
    executable: PathBuf,
    closed: Arc<AtomicBool>,
}

impl GradleConnection {
    fn ensure_open(&self) -> ToolingResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolingError::connection_closed(format!(
                "Connection {} to {} has been closed",
                self.id,
                self.project_dir.display()
            )));
        }
        Ok(())
    }

    fn write_init_script(&self) -> ToolingResult<PathBuf> {
        let dir = self.project_dir.join(CACHE_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(model::INIT_SCRIPT_NAME);
        std::fs::write(&path, model::INIT_SCRIPT)?;
        Ok(path)
    }
}

#[async_trait]
impl ProjectConnection for GradleConnection {
    fn id(&self) -> u64 {
        self.id
    }

    async fn run_build(
        &self,
        invocation: BuildInvocation,
        output: OutputSink,
        cancel: CancellationToken,
    ) -> ToolingResult<()> {
        self.ensure_open()?;

        process::run_gradle(
            &self.executable,
            &self.project_dir,
            &invocation.command_line(),
            |line| output.emit(line),
            cancel,
        )
        .await
    }

    async fn fetch_model(
        &self,
        invocation: BuildInvocation,
        output: OutputSink,
        cancel: CancellationToken,
    ) -> ToolingResult<ProjectModel> {
        self.ensure_open()?;

        let init_script = self.write_init_script()?;
        let mut args = vec![
            "--init-script".to_string(),
            init_script.to_string_lossy().into_owned(),
        ];
        args.extend(invocation.command_line());
        if invocation.tasks.is_empty() {
            args.push("help".to_string());
        }

        let mut payload = None;
        process::run_gradle(
            &self.executable,
            &self.project_dir,
            &args,
            |line| match model::model_payload(line) {
                Some(json) => payload = Some(json.to_string()),
                None => output.emit(line),
            },
            cancel,
        )
        .await?;

        let payload = payload
            .ok_or_else(|| ToolingError::build("Gradle did not report a project model"))?;
        model::parse_model(&payload)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
