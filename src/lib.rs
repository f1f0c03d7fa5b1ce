//! Switchyard - message-router client toolkit
//!
//! This is the main convenience crate that re-exports the switchyard
//! sub-crates. Use this crate if you want a single dependency for talking
//! to a switchyard message broker.
//!
//! # Architecture
//!
//! Switchyard is organized into modular crates:
//!
//! - **switchyard-core**: Wire messages, codec, error taxonomy, observability
//! - **switchyard-client**: The stateful client over a pluggable connection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard::{RouterClient, RouterOptions};
//! use switchyard::client::{PublishOptions, TopicSubscriber};
//!
//! # async fn example(connection: Arc<dyn switchyard::client::Connection>) -> switchyard::core::Result<()> {
//! let client = RouterClient::new(connection, RouterOptions::new());
//! client.connect().await?;
//!
//! client
//!     .subscribe(
//!         "orders",
//!         TopicSubscriber::from_fn(|msg| async move {
//!             println!("order event: {:?}", msg.payload);
//!         }),
//!     )
//!     .await?;
//!
//! client
//!     .publish("orders", Some(serde_json::json!({"id": 1})), PublishOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through the `switchyard::` prefix
pub use switchyard_client as client;
pub use switchyard_core as core;

// Convenience re-exports of the most commonly used types
pub use switchyard_client::{RouterClient, RouterOptions};
pub use switchyard_core::{Error, Message, Result};
