//! Endpoint handler table
//!
//! Holds the async handlers this client exposes to the broker. One handler
//! per endpoint name; a second registration for the same name is an error,
//! it never silently replaces the first.
//!
//! Handlers are `Arc`ed async closures so the invoke dispatcher can clone
//! one out of the table and run it on a spawned task without holding the
//! table lock across the call.

use crate::options::MessageContext;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{Error, Result};
use tokio::sync::Mutex;

/// Async endpoint handler: `(endpoint, payload, context) -> payload`.
pub type EndpointHandler = Arc<
    dyn Fn(String, Option<Value>, MessageContext) -> BoxFuture<'static, Result<Option<Value>>>
        + Send
        + Sync,
>;

/// Table of locally registered endpoint handlers
#[derive(Clone)]
pub struct EndpointTable {
    handlers: Arc<Mutex<HashMap<String, EndpointHandler>>>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a handler. Fails with `DuplicateEndpoint` if one is already
    /// registered under this name.
    pub async fn insert(&self, endpoint: &str, handler: EndpointHandler) -> Result<()> {
        let mut handlers = self.handlers.lock().await;
        if handlers.contains_key(endpoint) {
            return Err(Error::DuplicateEndpoint(endpoint.to_string()));
        }
        handlers.insert(endpoint.to_string(), handler);
        Ok(())
    }

    /// Remove a handler. Returns true if one was registered.
    pub async fn remove(&self, endpoint: &str) -> bool {
        self.handlers.lock().await.remove(endpoint).is_some()
    }

    /// Look up the handler for an endpoint, cloning it out of the table.
    pub async fn get(&self, endpoint: &str) -> Option<EndpointHandler> {
        self.handlers.lock().await.get(endpoint).cloned()
    }

    pub async fn contains(&self, endpoint: &str) -> bool {
        self.handlers.lock().await.contains_key(endpoint)
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a plain async closure as an [`EndpointHandler`].
pub fn handler_fn<F, Fut>(f: F) -> EndpointHandler
where
    F: Fn(String, Option<Value>, MessageContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<Value>>> + Send + 'static,
{
    Arc::new(move |endpoint, payload, context| Box::pin(f(endpoint, payload, context)))
}
