//! Core protocol types for the switchyard message router
//!
//! This crate contains everything both sides of the protocol agree on and
//! nothing that belongs to either side's state machine:
//!
//! - **Wire messages**: the `type`-tagged JSON union ([`Message`]) with
//!   request/response pairs for publish, subscribe, invoke and service
//!   registration, plus the server-push `Topic` shape
//! - **Codec**: JSON text encode/decode ([`codec`])
//! - **Errors**: the application error taxonomy ([`Error`]) and the wire
//!   error object ([`ProtocolError`])
//! - **Observability**: OpenTelemetry bootstrap shared by binaries
//!   ([`init_observability`])
//!
//! The stateful client built on these types lives in `switchyard-client`.

pub mod codec;
pub mod error;
pub mod messages;
pub mod observability;

pub use error::{error_names, Error, ProtocolError, Result};
pub use messages::{
    validate_endpoint_name, validate_topic_name, ConnectRequest, ConnectResponse,
    EndpointDescriptor, InvokeRequest, InvokeResponse, Message, PublishRequest, PublishResponse,
    RegisterServiceRequest, RegisterServiceResponse, SubscribeRequest, SubscribeResponse,
    TopicNotification, UnregisterServiceRequest, UnregisterServiceResponse, UnsubscribeRequest,
    UnsubscribeResponse,
};
pub use observability::{
    init_observability, shutdown_observability, ObservabilityConfig,
};
