use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use widget_bridge_protocol::{RequestId, RpcError};

pub type Outcome = Result<Value, RpcError>;

/// Requests issued by one side of the bridge that still await a response.
#[derive(Debug)]
pub struct PendingRequests {
    next_id: AtomicI64,
    entries: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
    timeout: Duration,
}

/// Receiving half of a registered request.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl PendingRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            entries: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocates the next id and records its continuation. Must happen before
    /// the request is posted so an immediate response finds its entry.
    pub async fn register(&self) -> PendingResponse {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.entries.lock().await.insert(id.clone(), tx);
        PendingResponse { id, rx }
    }

    /// Hands a response to its waiter. Returns false for orphans (unknown or
    /// already timed-out ids), which are dropped.
    pub async fn complete(&self, id: &RequestId, outcome: Outcome) -> bool {
        let sender = self.entries.lock().await.remove(id);
        match sender {
            Some(tx) => {
                tracing::debug!(id = %id, is_error = outcome.is_err(), "response matched to pending request");
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::warn!(id = %id, "response has no matching pending request (orphan)");
                false
            }
        }
    }

    /// Waits for the response or the timeout, whichever comes first. The
    /// table entry is gone afterwards in both cases.
    pub async fn wait(&self, pending: PendingResponse) -> Outcome {
        let PendingResponse { id, rx } = pending;
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.entries.lock().await.remove(&id);
                tracing::warn!(id = %id, "pending request dropped before a response arrived");
                Err(RpcError::request_timeout())
            }
            Err(_) => {
                self.entries.lock().await.remove(&id);
                tracing::warn!(
                    id = %id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(RpcError::request_timeout())
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
