//! Requests awaiting a response from the client

use crate::protocol::{RequestId, RpcError, RpcResponse};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::warn;

/// Server-to-client requests that have been sent but not answered
#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<RequestId, oneshot::Sender<RpcResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the receiver for its response
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<RpcResponse> {
        let (sender, receiver) = oneshot::channel();
        self.inner.lock().insert(id, sender);
        receiver
    }

    /// Forget a request, e.g. after it timed out
    pub fn remove(&self, id: &RequestId) {
        self.inner.lock().remove(id);
    }

    /// Route a response to its waiter. Returns false for unknown ids.
    pub fn complete(&self, response: RpcResponse) -> bool {
        let sender = match &response.id {
            Some(id) => self.inner.lock().remove(id),
            None => None,
        };

        match sender {
            Some(sender) => {
                if sender.send(response).is_err() {
                    warn!("Response arrived after the waiter gave up");
                }
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding request
    pub fn fail_all(&self, message: &str) {
        let drained: Vec<_> = self.inner.lock().drain().collect();
        for (id, sender) in drained {
            warn!("Cancelling pending request {}: {}", id, message);
            let _ = sender.send(RpcResponse::error(
                Some(id),
                RpcError::new(RpcError::INTERNAL_ERROR, message),
            ));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
