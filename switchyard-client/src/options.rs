//! Option and context types for client operations

use serde_json::Value;

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Access token forwarded in the connect handshake.
    pub access_token: Option<String>,
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Per-call options for `publish`.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub correlation_id: Option<String>,
    pub scope: Option<String>,
}

impl PublishOptions {
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Per-call options for `invoke`.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub correlation_id: Option<String>,
    pub scope: Option<String>,
}

impl InvokeOptions {
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Routing metadata attached to an inbound message.
///
/// `source_id` is the broker-assigned id of the publishing or invoking
/// client; the broker stamps it, so handlers can trust it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContext {
    pub source_id: Option<String>,
    pub correlation_id: Option<String>,
    pub scope: Option<String>,
}

/// A message delivered to a topic subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Option<Value>,
    pub context: MessageContext,
}
