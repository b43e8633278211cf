//! In-process fakes for exercising the server without Gradle
//!
//! [`RecordingClient`] records every callback in order. [`FakeConnectorFactory`]
//! hands out connections whose builds follow a script of [`BuildOutcome`]s.

use crate::client::ToolingClient;
use crate::connection::{BuildInvocation, Connector, ConnectorFactory, OutputSink, ProjectConnection};
use crate::error::{ToolingError, ToolingResult};
use crate::messages::{
    BuildDistribution, BuildInfo, BuildResult, ClientBuildConfig, WrapperAvailability,
};
use crate::project::{ProjectModel, ProjectNode};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Something the server told or asked the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    WrapperCheck,
    PrepareBuild(BuildInfo),
    Output(String),
    BuildSuccessful(BuildResult),
    BuildFailed(BuildResult),
}

/// Client that answers from fixed settings and records every call
pub struct RecordingClient {
    events: Mutex<Vec<ClientEvent>>,
    build_config: Mutex<ClientBuildConfig>,
    wrapper_available: AtomicBool,
    fail_requests: AtomicBool,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            build_config: Mutex::new(ClientBuildConfig::default()),
            wrapper_available: AtomicBool::new(true),
            fail_requests: AtomicBool::new(false),
        }
    }
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_config(self, config: ClientBuildConfig) -> Self {
        *self.build_config.lock() = config;
        self
    }

    pub fn set_wrapper_available(&self, available: bool) {
        self.wrapper_available.store(available, Ordering::SeqCst);
    }

    /// Make every request to the client fail
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn successes(&self) -> Vec<BuildResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::BuildSuccessful(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<BuildResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::BuildFailed(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn prepared_builds(&self) -> Vec<BuildInfo> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::PrepareBuild(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn output(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Output(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn wrapper_checks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ClientEvent::WrapperCheck))
            .count()
    }

    fn record(&self, event: ClientEvent) {
        self.events.lock().push(event);
    }

    fn check_failure(&self) -> ToolingResult<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ToolingError::client("client unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolingClient for RecordingClient {
    async fn prepare_build(&self, info: BuildInfo) -> ToolingResult<ClientBuildConfig> {
        self.record(ClientEvent::PrepareBuild(info));
        self.check_failure()?;
        Ok(self.build_config.lock().clone())
    }

    async fn check_wrapper_availability(&self) -> ToolingResult<WrapperAvailability> {
        self.record(ClientEvent::WrapperCheck);
        self.check_failure()?;
        Ok(WrapperAvailability {
            is_available: self.wrapper_available.load(Ordering::SeqCst),
        })
    }

    fn on_build_successful(&self, result: BuildResult) {
        self.record(ClientEvent::BuildSuccessful(result));
    }

    fn on_build_failed(&self, result: BuildResult) {
        self.record(ClientEvent::BuildFailed(result));
    }

    fn on_output(&self, line: String) {
        self.record(ClientEvent::Output(line));
    }
}

/// How a scripted build or model fetch ends
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Succeed,
    Fail(ToolingError),
    /// Run until cancelled
    WaitForCancel,
    /// Run until [`FakeConnectorFactory::release`] or cancelled
    WaitForRelease,
}

#[derive(Default)]
struct FakeState {
    next_connection_id: AtomicU64,
    connectors_created: AtomicUsize,
    disconnects: AtomicUsize,
    daemon_stops: AtomicUsize,
    model_fetches: AtomicUsize,
    last_distribution: Mutex<Option<BuildDistribution>>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    fail_next_connect: Mutex<Option<ToolingError>>,
    build_outcomes: Mutex<VecDeque<BuildOutcome>>,
    model_outcomes: Mutex<VecDeque<BuildOutcome>>,
    invocations: Mutex<Vec<BuildInvocation>>,
    output_lines: Mutex<Vec<String>>,
    started: Notify,
    release: Notify,
}

/// Connector factory whose connections never leave the process
#[derive(Default)]
pub struct FakeConnectorFactory {
    state: Arc<FakeState>,
}

impl FakeConnectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next build; unscripted builds succeed
    pub fn push_build_outcome(&self, outcome: BuildOutcome) {
        self.state.build_outcomes.lock().push_back(outcome);
    }

    /// Queue the outcome of the next model fetch; unscripted fetches succeed
    pub fn push_model_outcome(&self, outcome: BuildOutcome) {
        self.state.model_outcomes.lock().push_back(outcome);
    }

    /// Lines every build prints before finishing
    pub fn set_output(&self, lines: &[&str]) {
        *self.state.output_lines.lock() = lines.iter().map(|l| l.to_string()).collect();
    }

    pub fn fail_next_connect(&self, error: ToolingError) {
        *self.state.fail_next_connect.lock() = Some(error);
    }

    /// Wait until a blocking (`WaitFor*`) build or model fetch has started
    pub async fn wait_for_start(&self) {
        self.state.started.notified().await;
    }

    /// Let one `WaitForRelease` build finish successfully
    pub fn release(&self) {
        self.state.release.notify_one();
    }

    pub fn connectors_created(&self) -> usize {
        self.state.connectors_created.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn daemon_stops(&self) -> usize {
        self.state.daemon_stops.load(Ordering::SeqCst)
    }

    pub fn model_fetches(&self) -> usize {
        self.state.model_fetches.load(Ordering::SeqCst)
    }

    pub fn last_distribution(&self) -> Option<BuildDistribution> {
        self.state.last_distribution.lock().clone()
    }

    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.state.invocations.lock().clone()
    }

    pub fn connection(&self, id: u64) -> Option<Arc<FakeConnection>> {
        self.state
            .connections
            .lock()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
}

#[async_trait]
impl ConnectorFactory for FakeConnectorFactory {
    fn new_connector(
        &self,
        project_dir: &Path,
        distribution: &BuildDistribution,
    ) -> ToolingResult<Box<dyn Connector>> {
        self.state.connectors_created.fetch_add(1, Ordering::SeqCst);
        *self.state.last_distribution.lock() = Some(distribution.clone());

        Ok(Box::new(FakeConnector {
            project_dir: project_dir.to_path_buf(),
            state: Arc::clone(&self.state),
            opened: Mutex::new(Vec::new()),
        }))
    }

    async fn stop_daemons(&self) {
        self.state.daemon_stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeConnector {
    project_dir: PathBuf,
    state: Arc<FakeState>,
    opened: Mutex<Vec<Arc<FakeConnection>>>,
}

impl Connector for FakeConnector {
    fn connect(&self) -> ToolingResult<Arc<dyn ProjectConnection>> {
        if let Some(error) = self.state.fail_next_connect.lock().take() {
            return Err(error);
        }

        let connection = Arc::new(FakeConnection {
            id: self.state.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1,
            project_dir: self.project_dir.clone(),
            closed: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        });
        self.state.connections.lock().push(Arc::clone(&connection));
        self.opened.lock().push(Arc::clone(&connection));
        Ok(connection)
    }

    fn disconnect(&self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        for connection in self.opened.lock().drain(..) {
            connection.close();
        }
    }
}

/// Connection produced by [`FakeConnectorFactory`]
pub struct FakeConnection {
    id: u64,
    project_dir: PathBuf,
    closed: AtomicBool,
    state: Arc<FakeState>,
}

impl FakeConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> ToolingResult<()> {
        if self.is_closed() {
            return Err(ToolingError::connection_closed("fake connection closed"));
        }
        Ok(())
    }

    async fn play(&self, outcome: BuildOutcome, cancel: CancellationToken) -> ToolingResult<()> {
        match outcome {
            BuildOutcome::Succeed => Ok(()),
            BuildOutcome::Fail(error) => Err(error),
            BuildOutcome::WaitForCancel => {
                self.state.started.notify_one();
                cancel.cancelled().await;
                Err(ToolingError::Cancelled)
            }
            BuildOutcome::WaitForRelease => {
                self.state.started.notify_one();
                tokio::select! {
                    _ = self.state.release.notified() => Ok(()),
                    _ = cancel.cancelled() => Err(ToolingError::Cancelled),
                }
            }
        }
    }
}

#[async_trait]
impl ProjectConnection for FakeConnection {
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
        self.state.invocations.lock().push(invocation);

        let lines = self.state.output_lines.lock().clone();
        for line in &lines {
            output.emit(line);
        }

        let outcome = self
            .state
            .build_outcomes
            .lock()
            .pop_front()
            .unwrap_or(BuildOutcome::Succeed);
        self.play(outcome, cancel).await
    }

    async fn fetch_model(
        &self,
        _invocation: BuildInvocation,
        _output: OutputSink,
        cancel: CancellationToken,
    ) -> ToolingResult<ProjectModel> {
        self.ensure_open()?;
        self.state.model_fetches.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .state
            .model_outcomes
            .lock()
            .pop_front()
            .unwrap_or(BuildOutcome::Succeed);
        self.play(outcome, cancel).await?;

        let name = self
            .project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ProjectModel::new(ProjectNode::new(name, ":", &self.project_dir)))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
