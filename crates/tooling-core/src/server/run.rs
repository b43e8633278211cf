//! The server loop

use super::ToolingServer;
use super::dispatch::handle_request;
use crate::client::{PendingRequests, RemoteClient};
use crate::error::ToolingResult;
use crate::protocol::{RpcError, RpcMessage, RpcResponse, methods};
use crate::transport::{MessageReader, spawn_writer};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Serve JSON-RPC on `input`/`output` until shutdown or end of input.
///
/// Requests are handled on their own tasks so a long build never stalls the
/// read loop. `server/shutdown` is handled inline and ends the loop once it
/// has been answered. If the input ends without a shutdown, the server is
/// shut down anyway.
pub async fn serve<R, W>(server: Arc<ToolingServer>, input: R, output: W) -> ToolingResult<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, writer) = spawn_writer(output);
    let pending = Arc::new(PendingRequests::new());
    server.connect(Arc::new(RemoteClient::new(
        outbound.clone(),
        Arc::clone(&pending),
        server.config().request_timeout(),
    )));

    // Reading a line is not cancel safe, so it gets its own task
    let (incoming_tx, mut incoming) = mpsc::channel(64);
    let reader = tokio::spawn(async move {
        let mut reader = MessageReader::new(input);
        while let Some(message) = reader.next_message().await {
            if incoming_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    let shutdown = server.shutdown_token();
    let mut tasks = JoinSet::new();
    info!("Tooling server listening");

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Server shut down, leaving loop");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("Request handler panicked: {}", e);
                    }
                }
                continue;
            }
            message = incoming.recv() => message,
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!("Failed to parse message: {}", e);
                let response = RpcResponse::error(
                    None,
                    RpcError::parse_error().with_data(json!(e.to_string())),
                );
                let _ = outbound.send(RpcMessage::Response(response));
                continue;
            }
            None => {
                warn!("Client closed the connection without shutting down the server");
                break;
            }
        };

        match message {
            RpcMessage::Request(request) if request.method == methods::SHUTDOWN => {
                server.shutdown().await;
                let _ = outbound.send(RpcMessage::Response(RpcResponse::success(
                    request.id,
                    Value::Null,
                )));
                break;
            }
            RpcMessage::Request(request) => {
                let server = Arc::clone(&server);
                let outbound = outbound.clone();
                tasks.spawn(async move {
                    let response = handle_request(&server, request).await;
                    if let Err(e) = outbound.send(RpcMessage::Response(response)) {
                        debug!("Dropping response: {}", e);
                    }
                });
            }
            RpcMessage::Response(response) => {
                let id = response.id.clone();
                let has_outcome = response.has_outcome();
                if pending.complete(response) {
                    continue;
                }
                if has_outcome {
                    warn!("Received response for unknown request");
                } else {
                    warn!("Rejecting message without a method or a result");
                    let response = RpcResponse::error(id, RpcError::invalid_request());
                    let _ = outbound.send(RpcMessage::Response(response));
                }
            }
            RpcMessage::Notification(notification) => {
                debug!("Ignoring notification {}", notification.method);
            }
        }
    }

    pending.fail_all("Client connection closed");

    if !server.is_shut_down() && (server.is_initialized() || server.is_connected()) {
        server.shutdown().await;
    }

    tasks.shutdown().await;
    reader.abort();
    outbound.close();
    if let Err(e) = writer.await {
        warn!("Writer task failed: {}", e);
    }

    info!("Tooling server stopped");
    Ok(())
}
