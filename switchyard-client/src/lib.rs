//! Message-router client over a pluggable connection
//!
//! This crate provides the stateful client side of the switchyard protocol.
//! It owns no transport: callers hand it anything implementing
//! [`Connection`] and the client drives the handshake, request correlation,
//! pub/sub fan-out, RPC dispatch and teardown on top of it.
//!
//! # Core Features
//!
//! - **Lifecycle**: explicit `Created → Connecting → Connected → Closing →
//!   Closed` state machine, single-use
//! - **Pub/Sub**: subscribe to topics, publish payloads; one broker
//!   subscription per topic regardless of local subscriber count
//! - **RPC**: invoke remote endpoints, serve endpoints registered on this
//!   client
//! - **Observability**: tracing instrumentation and optional OpenTelemetry
//!   metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard_client::{RouterClient, RouterOptions, TopicSubscriber};
//! use switchyard_client::{InvokeOptions, PublishOptions};
//! # async fn example(connection: Arc<dyn switchyard_client::Connection>) -> switchyard_core::Result<()> {
//! let client = RouterClient::new(connection, RouterOptions::new());
//! client.connect().await?;
//!
//! let subscription = client
//!     .subscribe(
//!         "prices",
//!         TopicSubscriber::from_fn(|msg| async move {
//!             println!("price update: {:?}", msg.payload);
//!         }),
//!     )
//!     .await?;
//!
//! client
//!     .publish("prices", Some(serde_json::json!({"bid": 1.08})), PublishOptions::default())
//!     .await?;
//!
//! let quote = client
//!     .invoke("pricing.getQuote", Some(serde_json::json!("EURUSD")), InvokeOptions::default())
//!     .await?;
//! println!("quote: {:?}", quote);
//!
//! subscription.unsubscribe().await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod connection;
mod deferred;
mod endpoint;
mod metrics;
mod options;
mod request;
mod topic;

pub use client::{ConnectionState, RouterClient, Subscription};
pub use connection::{CloseCallback, Connection, ErrorCallback, MessageCallback};
pub use deferred::Deferred;
pub use endpoint::{handler_fn, EndpointHandler, EndpointTable};
pub use metrics::ClientMetrics;
pub use options::{InvokeOptions, MessageContext, PublishOptions, RouterOptions, TopicMessage};
pub use request::PendingRequests;
pub use topic::{Topic, TopicSubscriber};
