use super::*;
use crate::client::MockToolingClient;
use crate::failure::FailureReason;
use crate::messages::{
    BuildRequest, CancellationRequestResult, InitializeResult, TaskExecutionResult,
};
use crate::project::sync;
use crate::testing::{BuildOutcome, ClientEvent, FakeConnectorFactory, RecordingClient};
use tempfile::TempDir;

struct Harness {
    server: Arc<ToolingServer>,
    factory: Arc<FakeConnectorFactory>,
    client: Arc<RecordingClient>,
    project: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_client(RecordingClient::new())
    }

    fn with_client(client: RecordingClient) -> Self {
        let factory = Arc::new(FakeConnectorFactory::new());
        let server = Arc::new(ToolingServer::new(
            ServerConfig::default(),
            Arc::clone(&factory) as Arc<dyn ConnectorFactory>,
        ));
        let client = Arc::new(client);
        server.connect(Arc::clone(&client) as Arc<dyn ToolingClient>);

        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("settings.gradle"), "rootProject.name = 'app'").unwrap();

        Self {
            server,
            factory,
            client,
            project,
        }
    }

    fn params(&self) -> InitializeParams {
        InitializeParams::new(self.project.path()).with_build_id("init-1")
    }

    async fn initialize(&self) -> InitializeResult {
        self.server.initialize(self.params()).await.unwrap()
    }
}

#[tokio::test]
async fn test_initialize_syncs_missing_cache() {
    let h = Harness::new();

    let result = h.initialize().await;

    assert_eq!(
        result,
        InitializeResult::success(sync::cache_file_for_project(h.project.path()))
    );
    assert!(h.server.is_initialized());
    assert_eq!(h.factory.model_fetches(), 1);
    assert!(sync::cache_file_for_project(h.project.path()).exists());

    let successes = h.client.successes();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].build_id.as_str(), "init-1");
    assert!(successes[0].tasks.is_empty());
    assert!(h.client.failures().is_empty());

    let prepared = h.client.prepared_builds();
    assert_eq!(prepared.len(), 1);
    assert!(prepared[0].tasks.is_empty());
}

#[tokio::test]
async fn test_reinitialize_reuses_connection_and_cache() {
    let h = Harness::new();
    h.initialize().await;
    h.client.clear();

    let result = h.initialize().await;

    assert!(result.is_successful());
    assert_eq!(h.factory.connectors_created(), 1);
    assert_eq!(h.factory.disconnects(), 0);
    assert_eq!(h.factory.model_fetches(), 1);
    assert!(h.client.successes().is_empty());
}

#[tokio::test]
async fn test_changed_params_reconnect_exactly_once() {
    let h = Harness::new();
    h.initialize().await;

    let params = h.params().with_build_id("init-2");
    let result = h.server.initialize(params).await.unwrap();

    assert!(result.is_successful());
    assert_eq!(h.factory.connectors_created(), 2);
    assert_eq!(h.factory.disconnects(), 1);
    assert!(h.factory.connection(1).unwrap().is_closed());
    assert!(!h.factory.connection(2).unwrap().is_closed());
}

#[tokio::test]
async fn test_full_sync_refetches_fresh_cache() {
    let h = Harness::new();
    h.initialize().await;

    let params = h.params().with_full_sync(true);
    h.server.initialize(params).await.unwrap();

    assert_eq!(h.factory.model_fetches(), 2);
}

#[tokio::test]
async fn test_changed_build_file_triggers_sync() {
    let h = Harness::new();
    h.initialize().await;

    std::fs::write(h.project.path().join("build.gradle"), "plugins {}").unwrap();
    h.initialize().await;

    assert_eq!(h.factory.model_fetches(), 2);
}

#[tokio::test]
async fn test_initialize_missing_directory() {
    let h = Harness::new();
    let params = InitializeParams::new(h.project.path().join("missing"));

    let result = h.server.initialize(params).await.unwrap();

    assert_eq!(result.failure_reason(), Some(FailureReason::ProjectNotFound));
    assert!(!h.server.is_initialized());
    assert_eq!(h.factory.connectors_created(), 0);
    assert!(h.client.successes().is_empty());
    assert!(h.client.failures().is_empty());
}

#[tokio::test]
async fn test_initialize_file_instead_of_directory() {
    let h = Harness::new();
    let params = InitializeParams::new(h.project.path().join("settings.gradle"));

    let result = h.server.initialize(params).await.unwrap();

    assert_eq!(
        result.failure_reason(),
        Some(FailureReason::ProjectNotDirectory)
    );
    assert_eq!(h.factory.connectors_created(), 0);
}

#[tokio::test]
async fn test_initialize_connect_failure() {
    let h = Harness::new();
    h.factory
        .fail_next_connect(ToolingError::connection("daemon refused"));

    let result = h.initialize().await;

    assert_eq!(result.failure_reason(), Some(FailureReason::ConnectionError));
    assert_eq!(h.client.failures().len(), 1);
    assert!(h.client.successes().is_empty());
    assert!(!h.server.is_connected());
}

#[tokio::test]
async fn test_initialize_model_failure_notifies_once() {
    let h = Harness::new();
    h.factory
        .push_model_outcome(BuildOutcome::Fail(ToolingError::build("bad settings")));

    let result = h.initialize().await;

    assert_eq!(result.failure_reason(), Some(FailureReason::BuildFailed));
    let failures = h.client.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].tasks.is_empty());
    assert!(h.client.successes().is_empty());
    assert!(!sync::cache_file_for_project(h.project.path()).exists());
}

#[tokio::test]
async fn test_execute_before_initialize() {
    let h = Harness::new();

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["assembleDebug"]))
        .await
        .unwrap();

    assert_eq!(
        result.failure_reason(),
        Some(FailureReason::ProjectNotInitialized)
    );
    assert!(h.client.events().is_empty());
}

#[tokio::test]
async fn test_execute_after_project_removed() {
    let h = Harness::new();
    h.initialize().await;
    h.client.clear();

    std::fs::remove_dir_all(h.project.path()).unwrap();
    let result = h
        .server
        .execute_tasks(BuildRequest::new(["assembleDebug"]))
        .await
        .unwrap();

    assert_eq!(result.failure_reason(), Some(FailureReason::ProjectNotFound));
    assert!(h.client.successes().is_empty());
    assert!(h.client.failures().is_empty());
}

#[tokio::test]
async fn test_execute_passes_client_tuning() {
    let client = RecordingClient::new().with_build_config(ClientBuildConfig {
        build_args: vec!["--parallel".into()],
        jvm_args: vec!["-Xmx2g".into()],
    });
    let h = Harness::with_client(client);
    h.factory.set_output(&["> Task :app:assembleDebug", "BUILD SUCCESSFUL"]);
    h.initialize().await;

    let request = BuildRequest::new(["assembleDebug"])
        .with_build_id("b-1")
        .with_extra_args(["--offline", "--parallel"]);
    let result = h.server.execute_tasks(request).await.unwrap();

    assert_eq!(result, TaskExecutionResult::Success);

    let invocations = h.factory.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].tasks, vec!["assembleDebug"]);
    assert_eq!(invocations[0].arguments, vec!["--parallel", "--offline"]);
    assert_eq!(invocations[0].jvm_arguments, vec!["-Xmx2g"]);

    assert_eq!(
        h.client.output(),
        vec!["> Task :app:assembleDebug", "BUILD SUCCESSFUL"]
    );
}

#[tokio::test]
async fn test_execute_failure_notifies_once() {
    let h = Harness::new();
    h.initialize().await;
    h.client.clear();
    h.factory
        .push_build_outcome(BuildOutcome::Fail(ToolingError::build("compilation failed")));

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["assembleDebug"]).with_build_id("b-2"))
        .await
        .unwrap();

    assert_eq!(result.failure_reason(), Some(FailureReason::BuildFailed));
    let failures = h.client.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].build_id.as_str(), "b-2");
    assert_eq!(failures[0].tasks, vec!["assembleDebug"]);
    assert!(h.client.successes().is_empty());
}

#[tokio::test]
async fn test_execute_unsupported_argument() {
    let h = Harness::new();
    h.initialize().await;
    h.factory.push_build_outcome(BuildOutcome::Fail(
        ToolingError::UnsupportedBuildArgument("--bogus".into()),
    ));

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["build"]).with_extra_args(["--bogus"]))
        .await
        .unwrap();

    assert_eq!(
        result.failure_reason(),
        Some(FailureReason::UnsupportedBuildArgument)
    );
}

#[tokio::test]
async fn test_prepare_build_failure_still_builds() {
    let h = Harness::new();
    h.initialize().await;
    h.client.set_fail_requests(true);

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["lint"]).with_extra_args(["--offline"]))
        .await
        .unwrap();

    assert!(result.is_successful());
    let invocations = h.factory.invocations();
    assert_eq!(invocations[0].arguments, vec!["--offline"]);
    assert!(invocations[0].jvm_arguments.is_empty());
}

#[tokio::test]
async fn test_second_build_rejected_while_running() {
    let h = Harness::new();
    h.initialize().await;
    h.factory.push_build_outcome(BuildOutcome::WaitForRelease);

    let server = Arc::clone(&h.server);
    let running = tokio::spawn(async move {
        server
            .execute_tasks(BuildRequest::new(["assembleDebug"]))
            .await
    });
    h.factory.wait_for_start().await;
    assert!(h.server.is_build_in_progress());

    let rejected = h.server.execute_tasks(BuildRequest::new(["lint"])).await;
    assert!(matches!(rejected, Err(ToolingError::BuildInProgress)));

    let rejected = h.server.initialize(h.params()).await;
    assert!(matches!(rejected, Err(ToolingError::BuildInProgress)));

    h.factory.release();
    let result = running.await.unwrap().unwrap();
    assert!(result.is_successful());
    assert!(!h.server.is_build_in_progress());
    assert_eq!(h.factory.invocations().len(), 1);

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["lint"]))
        .await
        .unwrap();
    assert!(result.is_successful());
}

#[tokio::test]
async fn test_cancel_running_build() {
    let h = Harness::new();
    h.initialize().await;
    h.client.clear();
    h.factory.push_build_outcome(BuildOutcome::WaitForCancel);

    assert_eq!(
        h.server.cancel_current_build(),
        CancellationRequestResult::no_running_build()
    );

    let server = Arc::clone(&h.server);
    let running = tokio::spawn(async move {
        server
            .execute_tasks(BuildRequest::new(["assembleDebug"]))
            .await
    });
    h.factory.wait_for_start().await;

    assert_eq!(
        h.server.cancel_current_build(),
        CancellationRequestResult::enqueued()
    );
    assert_eq!(
        h.server.cancel_current_build(),
        CancellationRequestResult::no_running_build()
    );

    let result = running.await.unwrap().unwrap();
    assert_eq!(result.failure_reason(), Some(FailureReason::BuildCancelled));
    assert_eq!(h.client.failures().len(), 1);
    assert!(h.client.successes().is_empty());
}

#[tokio::test]
async fn test_wrapper_check_only_for_wrapper() {
    let h = Harness::new();
    h.initialize().await;
    assert_eq!(h.client.wrapper_checks(), 1);

    h.server
        .execute_tasks(BuildRequest::new(["build"]))
        .await
        .unwrap();
    assert_eq!(h.client.wrapper_checks(), 2);
}

#[tokio::test]
async fn test_installation_skips_wrapper_check() {
    let mut client = MockToolingClient::new();
    client.expect_check_wrapper_availability().never();
    client
        .expect_prepare_build()
        .times(2)
        .returning(|_| Ok(ClientBuildConfig::default()));
    client.expect_on_build_successful().times(2).return_const(());
    client.expect_on_build_failed().never();
    client.expect_on_output().return_const(());

    let factory = Arc::new(FakeConnectorFactory::new());
    let server = ToolingServer::new(
        ServerConfig::default(),
        Arc::clone(&factory) as Arc<dyn ConnectorFactory>,
    );
    server.connect(Arc::new(client));

    let project = TempDir::new().unwrap();
    let distribution = BuildDistribution::Installation {
        path: project.path().join("gradle-8.7"),
    };
    let params = InitializeParams::new(project.path()).with_distribution(distribution.clone());

    assert!(server.initialize(params).await.unwrap().is_successful());
    assert_eq!(factory.last_distribution(), Some(distribution));

    let result = server
        .execute_tasks(BuildRequest::new(["build"]))
        .await
        .unwrap();
    assert!(result.is_successful());
}

#[tokio::test]
async fn test_initialize_then_execute_then_cancel() {
    let h = Harness::new();

    let result = h.initialize().await;
    assert!(result.is_successful());
    assert!(h.server.is_initialized());
    h.client.clear();

    let result = h
        .server
        .execute_tasks(BuildRequest::new(["assembleDebug"]))
        .await
        .unwrap();
    assert_eq!(result, TaskExecutionResult::Success);

    let terminal: Vec<_> = h
        .client
        .events()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                ClientEvent::BuildSuccessful(_) | ClientEvent::BuildFailed(_)
            )
        })
        .collect();
    assert_eq!(terminal.len(), 1);
    match &terminal[0] {
        ClientEvent::BuildSuccessful(result) => assert_eq!(result.tasks, vec!["assembleDebug"]),
        other => panic!("unexpected event {:?}", other),
    }

    let cancel = h.server.cancel_current_build();
    assert!(!cancel.was_enqueued);
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let h = Harness::new();
    h.initialize().await;
    let token = h.server.shutdown_token();

    h.server.shutdown().await;

    assert!(token.is_cancelled());
    assert!(!h.server.is_initialized());
    assert!(!h.server.is_connected());
    assert!(h.factory.connection(1).unwrap().is_closed());
    assert_eq!(h.factory.disconnects(), 1);
    assert_eq!(h.factory.daemon_stops(), 1);

    h.server.shutdown().await;
    assert_eq!(h.factory.disconnects(), 1);
    assert_eq!(h.factory.daemon_stops(), 1);
}

#[tokio::test]
async fn test_shutdown_cancels_running_build() {
    let h = Harness::new();
    h.initialize().await;
    h.factory.push_build_outcome(BuildOutcome::WaitForCancel);

    let server = Arc::clone(&h.server);
    let running = tokio::spawn(async move {
        server
            .execute_tasks(BuildRequest::new(["assembleDebug"]))
            .await
    });
    h.factory.wait_for_start().await;

    h.server.shutdown().await;

    let result = running.await.unwrap().unwrap();
    assert_eq!(result.failure_reason(), Some(FailureReason::BuildCancelled));
}

#[tokio::test]
async fn test_shutdown_keeps_daemons_when_disabled() {
    let mut config = ServerConfig::default();
    config.connection.stop_daemons_on_shutdown = false;
    let factory = Arc::new(FakeConnectorFactory::new());
    let server = ToolingServer::new(config, Arc::clone(&factory) as Arc<dyn ConnectorFactory>);

    server.shutdown().await;

    assert_eq!(factory.daemon_stops(), 0);
}
