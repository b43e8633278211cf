//! Request dispatch

use super::ToolingServer;
use crate::error::ToolingError;
use crate::protocol::{RpcError, RpcRequest, RpcResponse, methods};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

/// Serve one client request
pub async fn handle_request(server: &ToolingServer, request: RpcRequest) -> RpcResponse {
    debug!("Handling {} (id {})", request.method, request.id);

    match dispatch(server, &request.method, request.params).await {
        Ok(value) => RpcResponse::success(request.id, value),
        Err(error) => RpcResponse::error(Some(request.id), error),
    }
}

async fn dispatch(
    server: &ToolingServer,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    match method {
        methods::METADATA => to_value(server.metadata()),
        methods::INITIALIZE => {
            let params = parse_params(params)?;
            to_value(server.initialize(params).await.map_err(to_rpc_error)?)
        }
        methods::IS_SERVER_INITIALIZED => to_value(server.is_initialized()),
        methods::EXECUTE_TASKS => {
            let request = parse_params(params)?;
            to_value(server.execute_tasks(request).await.map_err(to_rpc_error)?)
        }
        methods::CANCEL_CURRENT_BUILD => to_value(server.cancel_current_build()),
        methods::SHUTDOWN => {
            server.shutdown().await;
            Ok(Value::Null)
        }
        _ => Err(RpcError::method_not_found().with_data(json!({ "method": method }))),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| RpcError::invalid_params().with_data(json!(e.to_string())))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal_error().with_data(json!(e.to_string())))
}

fn to_rpc_error(error: ToolingError) -> RpcError {
    match error {
        ToolingError::BuildInProgress => RpcError::build_in_progress(),
        other => RpcError::internal_error().with_data(json!(other.to_string())),
    }
}
