//! Wire message shapes for the message-router protocol
//!
//! The protocol is a small JSON tagged union discriminated by a `type`
//! field. Requests carry a client-generated `requestId` and are answered by
//! a response of the matching kind with the same id; `Topic` is the one
//! server-push shape and has no request id.
//!
//! # Message Flow
//!
//! 1. **Connect**: `Connect` → `ConnectResponse` (handshake, assigns client id)
//! 2. **Pub/Sub**: `Publish`/`Subscribe`/`Unsubscribe` + responses, `Topic` pushes
//! 3. **RPC**: `Invoke` → `InvokeResponse` (either direction: the broker also
//!    forwards invokes *to* clients that registered the target endpoint)
//! 4. **Services**: `RegisterService`/`UnregisterService` + responses
//!
//! # Design Notes
//!
//! The union is a closed enum matched exhaustively at the dispatch boundary;
//! a message kind the dispatcher does not care about is logged and dropped
//! rather than probed structurally at runtime.

use crate::error::{Error, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level wire message, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Connect(ConnectRequest),
    ConnectResponse(ConnectResponse),
    Publish(PublishRequest),
    PublishResponse(PublishResponse),
    Subscribe(SubscribeRequest),
    SubscribeResponse(SubscribeResponse),
    Unsubscribe(UnsubscribeRequest),
    UnsubscribeResponse(UnsubscribeResponse),
    Invoke(InvokeRequest),
    InvokeResponse(InvokeResponse),
    RegisterService(RegisterServiceRequest),
    RegisterServiceResponse(RegisterServiceResponse),
    UnregisterService(UnregisterServiceRequest),
    UnregisterServiceResponse(UnregisterServiceResponse),
    Topic(TopicNotification),
}

/// Handshake request. The access token comes from client configuration and
/// is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Handshake response. Carries the broker-assigned client id, or an error
/// if the broker rejected the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub request_id: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub request_id: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub request_id: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

/// Invoke request. Outgoing invokes carry no `sourceId`; the broker stamps
/// it when forwarding the invoke to the client that registered the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub request_id: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

/// Optional metadata attached to a service registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceRequest {
    pub request_id: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<EndpointDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterServiceRequest {
    pub request_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterServiceResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

/// Server-push topic message. No request id; dropped silently by clients
/// with no local subscriber for the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNotification {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Message {
    /// The `type` discriminator of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Connect(_) => "Connect",
            Message::ConnectResponse(_) => "ConnectResponse",
            Message::Publish(_) => "Publish",
            Message::PublishResponse(_) => "PublishResponse",
            Message::Subscribe(_) => "Subscribe",
            Message::SubscribeResponse(_) => "SubscribeResponse",
            Message::Unsubscribe(_) => "Unsubscribe",
            Message::UnsubscribeResponse(_) => "UnsubscribeResponse",
            Message::Invoke(_) => "Invoke",
            Message::InvokeResponse(_) => "InvokeResponse",
            Message::RegisterService(_) => "RegisterService",
            Message::RegisterServiceResponse(_) => "RegisterServiceResponse",
            Message::UnregisterService(_) => "UnregisterService",
            Message::UnregisterServiceResponse(_) => "UnregisterServiceResponse",
            Message::Topic(_) => "Topic",
        }
    }

    /// Request id, for the message kinds that carry one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Message::Publish(m) => Some(&m.request_id),
            Message::PublishResponse(m) => Some(&m.request_id),
            Message::Subscribe(m) => Some(&m.request_id),
            Message::SubscribeResponse(m) => Some(&m.request_id),
            Message::Unsubscribe(m) => Some(&m.request_id),
            Message::UnsubscribeResponse(m) => Some(&m.request_id),
            Message::Invoke(m) => Some(&m.request_id),
            Message::InvokeResponse(m) => Some(&m.request_id),
            Message::RegisterService(m) => Some(&m.request_id),
            Message::RegisterServiceResponse(m) => Some(&m.request_id),
            Message::UnregisterService(m) => Some(&m.request_id),
            Message::UnregisterServiceResponse(m) => Some(&m.request_id),
            Message::Connect(_) | Message::ConnectResponse(_) | Message::Topic(_) => None,
        }
    }

    /// True for responses that settle a pending request. `ConnectResponse`
    /// is excluded: it settles the shared connected future, not the table.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::PublishResponse(_)
                | Message::SubscribeResponse(_)
                | Message::UnsubscribeResponse(_)
                | Message::InvokeResponse(_)
                | Message::RegisterServiceResponse(_)
                | Message::UnregisterServiceResponse(_)
        )
    }

    /// The error field of a response message, if set.
    pub fn response_error(&self) -> Option<&ProtocolError> {
        match self {
            Message::ConnectResponse(m) => m.error.as_ref(),
            Message::PublishResponse(m) => m.error.as_ref(),
            Message::SubscribeResponse(m) => m.error.as_ref(),
            Message::UnsubscribeResponse(m) => m.error.as_ref(),
            Message::InvokeResponse(m) => m.error.as_ref(),
            Message::RegisterServiceResponse(m) => m.error.as_ref(),
            Message::UnregisterServiceResponse(m) => m.error.as_ref(),
            _ => None,
        }
    }
}

/// Validate a topic name: non-empty, no whitespace or control characters.
pub fn validate_topic_name(topic: &str) -> Result<()> {
    if topic.is_empty() || topic.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Validate an endpoint name: same syntax rules as topic names.
pub fn validate_endpoint_name(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() || endpoint.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(())
}
