//! Request tracking for the message-router client
//!
//! This module manages the lifecycle of outgoing requests, correlating
//! requests with their eventual responses.
//!
//! # Request Lifecycle
//!
//! 1. **Generate ID**: assign the next counter value as the request id
//! 2. **Register**: create a oneshot channel for the response
//! 3. **Send**: transmit the request over the connection
//! 4. **Wait**: caller awaits the oneshot receiver
//! 5. **Complete**: the dispatcher matches the response id and sends it
//!    through the channel (or fails it, on error responses and teardown)
//!
//! # Why Oneshot Channels?
//!
//! Each request gets a dedicated oneshot channel because:
//! - Responses arrive asynchronously and out-of-order
//! - Channels provide natural async/await integration
//! - Oneshot cleanup is automatic (no memory leaks)

use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{Error, Message, Result};
use tokio::sync::{oneshot, Mutex};

/// Pending request waiting for a response
struct PendingRequest {
    tx: oneshot::Sender<Result<Message>>,
}

/// Table of in-flight requests, keyed by request id
///
/// Ids are the decimal rendering of a per-client monotonic counter starting
/// at 1, matching the wire format's string ids.
#[derive(Clone)]
pub struct PendingRequests {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
    counter: Arc<Mutex<u64>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(Mutex::new(0)),
        }
    }

    /// Generate the next request id ("1", "2", ...).
    pub async fn next_id(&self) -> String {
        let mut counter = self.counter.lock().await;
        *counter += 1;
        counter.to_string()
    }

    /// Register a pending request and return the receiver for its response.
    pub async fn register(&self, id: &str) -> oneshot::Receiver<Result<Message>> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(id.to_string(), PendingRequest { tx });
        rx
    }

    /// Complete a pending request with its response message.
    pub async fn complete(&self, id: &str, response: Message) {
        if let Some(pending) = self.pending.lock().await.remove(id) {
            let _ = pending.tx.send(Ok(response));
        }
    }

    /// Fail a pending request with an error.
    pub async fn fail(&self, id: &str, error: Error) {
        if let Some(pending) = self.pending.lock().await.remove(id) {
            let _ = pending.tx.send(Err(error));
        }
    }

    /// Drop a registration without settling it. Used to roll back when the
    /// send itself fails and the caller already holds the error.
    pub async fn remove(&self, id: &str) {
        self.pending.lock().await.remove(id);
    }

    /// Fail every pending request. Called once during teardown.
    pub async fn fail_all(&self, error: Error) {
        let mut pending = self.pending.lock().await;
        for (_, req) in pending.drain() {
            let _ = req.tx.send(Err(error.clone()));
        }
    }

    /// Number of in-flight requests.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
