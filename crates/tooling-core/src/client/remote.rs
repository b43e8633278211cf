//! Client proxy over the JSON-RPC transport

use super::{PendingRequests, ToolingClient};
use crate::error::{ToolingError, ToolingResult};
use crate::messages::{BuildInfo, BuildResult, ClientBuildConfig, WrapperAvailability};
use crate::protocol::{RequestId, RpcMessage, RpcNotification, RpcRequest, methods};
use crate::transport::Outbound;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// [`ToolingClient`] that forwards every call to the peer on the other end
/// of the transport
pub struct RemoteClient {
    outbound: Outbound,
    pending: Arc<PendingRequests>,
    request_id: AtomicU64,
    request_timeout: Duration,
}

impl RemoteClient {
    pub fn new(outbound: Outbound, pending: Arc<PendingRequests>, request_timeout: Duration) -> Self {
        Self {
            outbound,
            pending,
            request_id: AtomicU64::new(1),
            request_timeout,
        }
    }

    /// Send a request and wait for the response with timeout
    async fn call<P, T>(&self, method: &str, params: Option<P>) -> ToolingResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = RpcRequest::new(id.clone(), method);
        if let Some(params) = params {
            request = request.with_params(serde_json::to_value(params)?);
        }

        let receiver = self.pending.register(id.clone());
        if let Err(e) = self.outbound.send(RpcMessage::Request(request)) {
            self.pending.remove(&id);
            return Err(e);
        }

        let response = match timeout(self.request_timeout, receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(ToolingError::connection_closed("Response channel closed"));
            }
            Err(_) => {
                self.pending.remove(&id);
                return Err(ToolingError::timeout(self.request_timeout.as_secs()));
            }
        };

        match response.into_result() {
            Ok(value) => serde_json::from_value(value).map_err(ToolingError::from),
            Err(e) => Err(ToolingError::client(format!("{} failed: {}", method, e))),
        }
    }

    fn notify(&self, method: &str, params: Value) {
        let notification = RpcNotification::new(method).with_params(params);
        if let Err(e) = self.outbound.send(RpcMessage::Notification(notification)) {
            debug!("Dropping {} notification: {}", method, e);
        }
    }

    fn notify_result(&self, method: &str, result: &BuildResult) {
        match serde_json::to_value(result) {
            Ok(params) => self.notify(method, params),
            Err(e) => warn!("Failed to encode {} payload: {}", method, e),
        }
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        RequestId::String(format!("srv-{}", id))
    }
}

#[async_trait]
impl ToolingClient for RemoteClient {
    #[instrument(skip(self, info), fields(build_id = %info.build_id))]
    async fn prepare_build(&self, info: BuildInfo) -> ToolingResult<ClientBuildConfig> {
        self.call(methods::PREPARE_BUILD, Some(info)).await
    }

    async fn check_wrapper_availability(&self) -> ToolingResult<WrapperAvailability> {
        self.call::<(), _>(methods::CHECK_WRAPPER_AVAILABILITY, None)
            .await
    }

    fn on_build_successful(&self, result: BuildResult) {
        self.notify_result(methods::ON_BUILD_SUCCESSFUL, &result);
    }

    fn on_build_failed(&self, result: BuildResult) {
        self.notify_result(methods::ON_BUILD_FAILED, &result);
    }

    fn on_output(&self, line: String) {
        self.notify(methods::ON_OUTPUT, json!({ "line": line }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::BuildId;
    use crate::protocol::{RpcError, RpcResponse};
    use crate::transport::{MessageReader, spawn_writer};

    fn setup(
        request_timeout: Duration,
    ) -> (
        Arc<RemoteClient>,
        Arc<PendingRequests>,
        MessageReader<tokio::io::DuplexStream>,
    ) {
        let (peer, ours) = tokio::io::duplex(8192);
        let (outbound, _writer) = spawn_writer(ours);
        let pending = Arc::new(PendingRequests::new());
        let client = Arc::new(RemoteClient::new(
            outbound,
            Arc::clone(&pending),
            request_timeout,
        ));
        (client, pending, MessageReader::new(peer))
    }

    #[tokio::test]
    async fn test_prepare_build_round_trip() {
        let (client, pending, mut peer) = setup(Duration::from_secs(5));

        let call = tokio::spawn({
            let client = Arc::clone(&client);
            async move {
                client
                    .prepare_build(BuildInfo::new(
                        BuildId::new("b-1"),
                        vec!["assembleDebug".into()],
                    ))
                    .await
            }
        });

        let request = match peer.next_message().await.unwrap().unwrap() {
            RpcMessage::Request(request) => request,
            other => panic!("expected request, got {:?}", other),
        };
        assert_eq!(request.method, methods::PREPARE_BUILD);
        assert_eq!(request.params.as_ref().unwrap()["buildId"], "b-1");

        assert!(pending.complete(RpcResponse::success(
            request.id,
            json!({"buildArgs": ["--parallel"], "jvmArgs": ["-Xmx2g"]}),
        )));

        let config = call.await.unwrap().unwrap();
        assert_eq!(config.build_args, vec!["--parallel"]);
        assert_eq!(config.jvm_args, vec!["-Xmx2g"]);
    }

    #[tokio::test]
    async fn test_error_response_becomes_client_error() {
        let (client, pending, mut peer) = setup(Duration::from_secs(5));

        let call = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.check_wrapper_availability().await }
        });

        let Some(Ok(RpcMessage::Request(request))) = peer.next_message().await else {
            panic!("expected request");
        };
        pending.complete(RpcResponse::error(
            Some(request.id),
            RpcError::method_not_found(),
        ));

        assert!(matches!(call.await.unwrap(), Err(ToolingError::Client(_))));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let (client, pending, _peer) = setup(Duration::from_millis(50));

        let result = client.check_wrapper_availability().await;

        assert!(matches!(result, Err(ToolingError::Timeout { .. })));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_notifications_carry_payload() {
        let (client, _pending, mut peer) = setup(Duration::from_secs(5));

        client.on_output("> Task :app:compile".into());
        client.on_build_failed(BuildResult::new(
            BuildId::new("b-2"),
            vec![],
            Duration::from_millis(3),
        ));

        let Some(Ok(RpcMessage::Notification(first))) = peer.next_message().await else {
            panic!("expected notification");
        };
        assert_eq!(first.method, methods::ON_OUTPUT);
        assert_eq!(first.params.unwrap()["line"], "> Task :app:compile");

        let Some(Ok(RpcMessage::Notification(second))) = peer.next_message().await else {
            panic!("expected notification");
        };
        assert_eq!(second.method, methods::ON_BUILD_FAILED);
        assert_eq!(second.params.unwrap()["buildId"], "b-2");
    }
}
