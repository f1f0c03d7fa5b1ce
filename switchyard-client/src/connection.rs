//! The transport capability consumed by the client
//!
//! The client does not open sockets. It is handed something that implements
//! [`Connection`] and drives it: `connect`, `send`, `close`, plus three
//! callback slots through which the transport pushes inbound messages,
//! transport errors, and the close event.
//!
//! # Callback Contract
//!
//! The client registers its callbacks **before** calling `connect()`, so no
//! early message can be lost. Implementations must invoke callbacks in the
//! order events occur on the wire; after the close callback fires no further
//! callbacks may fire.
//!
//! Callbacks are plain synchronous closures. The client's callbacks only
//! enqueue the event onto an internal channel, so implementations may call
//! them from any thread or task without blocking concerns.

use async_trait::async_trait;
use switchyard_core::{Error, Message, Result};

/// Inbound message callback.
pub type MessageCallback = Box<dyn Fn(Message) + Send + Sync>;

/// Transport error callback.
pub type ErrorCallback = Box<dyn Fn(Error) + Send + Sync>;

/// Close callback. The argument is the transport's reason, if it had one;
/// `None` means a clean close.
pub type CloseCallback = Box<dyn Fn(Option<Error>) + Send + Sync>;

/// Abstract two-way message transport.
///
/// Implementations wrap a concrete channel (a WebSocket, a named pipe, an
/// in-process queue) and surface it as: an async `connect`/`send`/`close`
/// surface plus push-style event callbacks.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the underlying channel.
    async fn connect(&self) -> Result<()>;

    /// Send one message. Fails if the channel is not open.
    async fn send(&self, message: Message) -> Result<()>;

    /// Close the underlying channel. Closing an already-closed channel is
    /// a no-op.
    async fn close(&self) -> Result<()>;

    /// Register the inbound message callback.
    fn on_message(&self, callback: MessageCallback);

    /// Register the transport error callback.
    fn on_error(&self, callback: ErrorCallback);

    /// Register the close callback.
    fn on_close(&self, callback: CloseCallback);
}
