//! The stateful message-router client
//!
//! [`RouterClient`] owns one [`Connection`] and drives it through the
//! lifecycle `Created → Connecting → Connected → Closing → Closed`. On top
//! of the raw transport it provides:
//!
//! - **Request correlation**: every outgoing request gets a fresh id and a
//!   oneshot the dispatcher settles when the matching response arrives
//! - **Pub/sub**: a topic registry with per-subscriber fan-out; the broker
//!   subscription is opened by the first local subscriber and torn down by
//!   the last
//! - **RPC**: `invoke` for outgoing calls, an endpoint handler table for
//!   calls the broker routes at us
//! - **Teardown**: `close()` and transport failure both funnel into one
//!   teardown path that broadcasts a terminal error to every pending
//!   request and every subscriber, exactly once
//!
//! # Concurrency Model
//!
//! Transport callbacks only enqueue events; a single spawned dispatcher
//! task consumes the queue, so inbound processing is serialized in wire
//! order. Work that runs user code (invoke handlers, subscriber callbacks)
//! is handed to its own task, so a slow or re-entrant handler cannot stall
//! the dispatcher or deadlock the client.
//!
//! `RouterClient` is cheaply cloneable; clones share all state.

use crate::connection::Connection;
use crate::deferred::Deferred;
use crate::endpoint::{EndpointHandler, EndpointTable};
use crate::metrics::ClientMetrics;
use crate::options::{InvokeOptions, MessageContext, PublishOptions, RouterOptions, TopicMessage};
use crate::request::PendingRequests;
use crate::topic::{Topic, TopicSubscriber};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use switchyard_core::messages::{
    ConnectRequest, EndpointDescriptor, InvokeRequest, InvokeResponse, PublishRequest,
    RegisterServiceRequest, SubscribeRequest, UnregisterServiceRequest, UnsubscribeRequest,
};
use switchyard_core::{
    validate_endpoint_name, validate_topic_name, Error, Message, ProtocolError, Result,
};
use tokio::sync::{mpsc, Mutex, RwLock};

/// Client lifecycle state.
///
/// Transitions are one-way: a closed client is never reused, callers
/// construct a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no connect attempted yet.
    Created,
    /// Handshake in flight.
    Connecting,
    /// Handshake acknowledged, fully operational.
    Connected,
    /// Teardown in progress.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    fn as_metric(self) -> i64 {
        match self {
            ConnectionState::Created => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closing => 3,
            ConnectionState::Closed => 4,
        }
    }
}

enum ConnectionEvent {
    Message(Message),
    Error(Error),
    Closed(Option<Error>),
}

struct ClientInner {
    connection: Arc<dyn Connection>,
    options: RouterOptions,
    state: Mutex<ConnectionState>,
    client_id: RwLock<Option<String>>,
    connected: Deferred<()>,
    closed: Deferred<()>,
    pending: PendingRequests,
    topics: Mutex<HashMap<String, Topic>>,
    pending_unsubscribe: Mutex<HashMap<String, Deferred<()>>>,
    endpoints: EndpointTable,
    metrics: Option<ClientMetrics>,
}

/// Stateful message-router client over an abstract [`Connection`].
#[derive(Clone)]
pub struct RouterClient {
    inner: Arc<ClientInner>,
}

/// Handle for one topic subscription. Dropping it does **not** unsubscribe;
/// call [`Subscription::unsubscribe`].
pub struct Subscription {
    client: RouterClient,
    topic: String,
    subscriber_id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove this subscriber. When it was the topic's last one, the broker
    /// subscription is torn down as well.
    pub async fn unsubscribe(self) -> Result<()> {
        self.client
            .remove_subscriber(&self.topic, self.subscriber_id)
            .await
    }
}

impl RouterClient {
    /// Create a client over the given connection. No I/O happens until
    /// [`connect`](Self::connect) (or the first operation that needs it).
    pub fn new(connection: Arc<dyn Connection>, options: RouterOptions) -> Self {
        Self::build(connection, options, None)
    }

    /// Create a client with OpenTelemetry metrics enabled.
    pub fn with_metrics(
        connection: Arc<dyn Connection>,
        options: RouterOptions,
        metrics: ClientMetrics,
    ) -> Self {
        Self::build(connection, options, Some(metrics))
    }

    fn build(
        connection: Arc<dyn Connection>,
        options: RouterOptions,
        metrics: Option<ClientMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connection,
                options,
                state: Mutex::new(ConnectionState::Created),
                client_id: RwLock::new(None),
                connected: Deferred::new(),
                closed: Deferred::new(),
                pending: PendingRequests::new(),
                topics: Mutex::new(HashMap::new()),
                pending_unsubscribe: Mutex::new(HashMap::new()),
                endpoints: EndpointTable::new(),
                metrics,
            }),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.lock().await
    }

    /// Broker-assigned client id; `None` before the handshake completes.
    pub async fn client_id(&self) -> Option<String> {
        self.inner.client_id.read().await.clone()
    }

    /// Connect to the broker.
    ///
    /// Idempotent: on a connected client this returns immediately, during
    /// a handshake it awaits the in-flight one (a second wire handshake is
    /// never started), and on a closing or closed client it fails with
    /// `ConnectionClosed`.
    pub async fn connect(&self) -> Result<()> {
        let start_handshake = {
            let mut state = self.inner.state.lock().await;
            match *state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => false,
                ConnectionState::Closing | ConnectionState::Closed => {
                    return Err(Error::ConnectionClosed)
                }
                ConnectionState::Created => {
                    *state = ConnectionState::Connecting;
                    true
                }
            }
        };

        if start_handshake {
            self.set_state_metric(ConnectionState::Connecting);
            if let Err(err) = self.connect_core().await {
                let failure = Error::ConnectionFailed(err.to_string());
                self.record_error(&failure);
                // A client that never reached Connected is dead, not stuck
                // in Connecting: tear down so state() reports Closed
                let _ = self.close_core(Some(failure)).await;
            }
        }

        self.inner.connected.wait().await
    }

    /// Close the client. Pending requests fail with `ConnectionClosed`,
    /// subscribers are completed, the transport is closed. Safe to call in
    /// any state and from several tasks at once.
    pub async fn close(&self) -> Result<()> {
        self.close_core(None).await
    }

    /// Publish a payload to a topic.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Option<Value>,
        options: PublishOptions,
    ) -> Result<()> {
        validate_topic_name(topic)?;

        let request_id = self.inner.pending.next_id().await;
        let message = Message::Publish(PublishRequest {
            request_id: request_id.clone(),
            topic: topic.to_string(),
            payload,
            correlation_id: options.correlation_id,
            scope: options.scope,
        });
        self.send_request(&request_id, message).await?;
        Ok(())
    }

    /// Call a service endpoint and await its response payload.
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: Option<Value>,
        options: InvokeOptions,
    ) -> Result<Option<Value>> {
        validate_endpoint_name(endpoint)?;

        let request_id = self.inner.pending.next_id().await;
        let message = Message::Invoke(InvokeRequest {
            request_id: request_id.clone(),
            endpoint: endpoint.to_string(),
            payload,
            source_id: None,
            correlation_id: options.correlation_id,
            scope: options.scope,
        });

        match self.send_request(&request_id, message).await? {
            Message::InvokeResponse(response) => Ok(response.payload),
            other => Err(Error::Protocol(ProtocolError::new(
                "Error",
                format!("unexpected response kind: {}", other.kind()),
            ))),
        }
    }

    /// Subscribe to a topic.
    ///
    /// The first local subscriber opens the broker subscription; later ones
    /// piggyback on it without wire traffic. If the broker rejects the
    /// subscribe, the subscriber is rolled back and the error propagates.
    pub async fn subscribe(
        &self,
        topic: &str,
        subscriber: TopicSubscriber,
    ) -> Result<Subscription> {
        validate_topic_name(topic)?;
        self.connect().await?;

        // An in-flight unsubscribe for the same topic must settle first, or
        // the broker could process Subscribe before the older Unsubscribe.
        // Checked while holding the topics lock: remove_subscriber registers
        // the deferred in the same critical section that observed the zero
        // count, so either this sees the entry with its subscriber still in
        // it, or it sees the deferred and waits.
        let (subscriber_id, is_first) = loop {
            let mut topics = self.inner.topics.lock().await;
            let in_flight = {
                self.inner
                    .pending_unsubscribe
                    .lock()
                    .await
                    .get(topic)
                    .cloned()
            };
            if let Some(settled) = in_flight {
                drop(topics);
                let _ = settled.wait().await;
                continue;
            }

            // Map presence tracks the wire subscription: entries are removed
            // only when the broker acknowledged Unsubscribe, so an existing
            // entry (even with zero subscribers, after a failed unsubscribe)
            // is still subscribed and needs no second Subscribe
            let is_first = !topics.contains_key(topic);
            let entry = topics
                .entry(topic.to_string())
                .or_insert_with(|| Topic::new(topic));
            break (entry.subscribe(subscriber), is_first);
        };

        if is_first {
            let request_id = self.inner.pending.next_id().await;
            let message = Message::Subscribe(SubscribeRequest {
                request_id: request_id.clone(),
                topic: topic.to_string(),
            });
            if let Err(err) = self.send_request(&request_id, message).await {
                let mut topics = self.inner.topics.lock().await;
                let now_empty = match topics.get_mut(topic) {
                    Some(entry) => {
                        entry.unsubscribe(subscriber_id);
                        entry.subscriber_count() == 0
                    }
                    None => false,
                };
                if now_empty {
                    topics.remove(topic);
                }
                return Err(err);
            }
        }

        Ok(Subscription {
            client: self.clone(),
            topic: topic.to_string(),
            subscriber_id,
        })
    }

    /// Register a service endpoint with the broker.
    ///
    /// The handler is installed locally before the wire round trip so an
    /// invoke arriving right after the ack always finds it; if the broker
    /// rejects the registration the handler is removed again. A duplicate
    /// local registration fails with `DuplicateEndpoint` without any wire
    /// traffic.
    pub async fn register_service(
        &self,
        endpoint: &str,
        handler: EndpointHandler,
        descriptor: Option<EndpointDescriptor>,
    ) -> Result<()> {
        validate_endpoint_name(endpoint)?;
        self.inner.endpoints.insert(endpoint, handler).await?;

        let request_id = self.inner.pending.next_id().await;
        let message = Message::RegisterService(RegisterServiceRequest {
            request_id: request_id.clone(),
            endpoint: endpoint.to_string(),
            descriptor,
        });
        if let Err(err) = self.send_request(&request_id, message).await {
            self.inner.endpoints.remove(endpoint).await;
            return Err(err);
        }
        Ok(())
    }

    /// Withdraw a service registration. A no-op if the endpoint is not
    /// registered on this client. The local handler stays in place until
    /// the broker acknowledges, so invokes routed to us in the meantime
    /// still find it.
    pub async fn unregister_service(&self, endpoint: &str) -> Result<()> {
        if !self.inner.endpoints.contains(endpoint).await {
            return Ok(());
        }

        let request_id = self.inner.pending.next_id().await;
        let message = Message::UnregisterService(UnregisterServiceRequest {
            request_id: request_id.clone(),
            endpoint: endpoint.to_string(),
        });
        self.send_request(&request_id, message).await?;
        self.inner.endpoints.remove(endpoint).await;
        Ok(())
    }

    /// Register a handler for invokes addressed directly to this client,
    /// without advertising it as a service to the broker.
    pub async fn register_endpoint(&self, endpoint: &str, handler: EndpointHandler) -> Result<()> {
        validate_endpoint_name(endpoint)?;
        self.inner.endpoints.insert(endpoint, handler).await
    }

    /// Remove a handler registered with
    /// [`register_endpoint`](Self::register_endpoint).
    pub async fn unregister_endpoint(&self, endpoint: &str) -> Result<()> {
        self.inner.endpoints.remove(endpoint).await;
        Ok(())
    }

    // --- handshake ---

    async fn connect_core(&self) -> Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Callbacks go in before connect() so no early message is lost;
        // they only enqueue, the dispatcher task does the work
        let tx = events_tx.clone();
        self.inner.connection.on_message(Box::new(move |message| {
            let _ = tx.send(ConnectionEvent::Message(message));
        }));
        let tx = events_tx.clone();
        self.inner.connection.on_error(Box::new(move |error| {
            let _ = tx.send(ConnectionEvent::Error(error));
        }));
        let tx = events_tx;
        self.inner.connection.on_close(Box::new(move |reason| {
            let _ = tx.send(ConnectionEvent::Closed(reason));
        }));

        let client = self.clone();
        tokio::spawn(async move {
            client.dispatch_loop(events_rx).await;
        });

        self.inner.connection.connect().await?;
        self.inner
            .connection
            .send(Message::Connect(ConnectRequest {
                access_token: self.inner.options.access_token.clone(),
            }))
            .await?;
        Ok(())
    }

    // --- inbound dispatch ---

    async fn dispatch_loop(self, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Message(message) => self.handle_message(message).await,
                ConnectionEvent::Error(error) => {
                    tracing::warn!(error = %error, "transport error, tearing down");
                    self.record_error(&error);
                    let _ = self.close_core(Some(error)).await;
                    break;
                }
                ConnectionEvent::Closed(reason) => {
                    if self.state().await != ConnectionState::Closing {
                        let error = reason.unwrap_or(Error::ConnectionAborted);
                        tracing::warn!(error = %error, "transport closed, tearing down");
                        self.record_error(&error);
                        let _ = self.close_core(Some(error)).await;
                    }
                    break;
                }
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        match message {
            Message::Topic(notification) => {
                if let Some(metrics) = &self.inner.metrics {
                    metrics.record_topic_message(&notification.topic);
                }
                let topics = self.inner.topics.lock().await;
                match topics.get(&notification.topic) {
                    Some(topic) => topic.publish(TopicMessage {
                        topic: notification.topic.clone(),
                        payload: notification.payload,
                        context: MessageContext {
                            source_id: Some(notification.source_id),
                            correlation_id: notification.correlation_id,
                            scope: notification.scope,
                        },
                    }),
                    None => {
                        tracing::debug!(
                            topic = %notification.topic,
                            "dropping topic message with no local subscriber"
                        );
                    }
                }
            }
            Message::ConnectResponse(response) => self.handle_connect_response(response).await,
            Message::Invoke(request) => {
                // User code runs on its own task so a slow or re-entrant
                // handler cannot stall the dispatcher
                let client = self.clone();
                tokio::spawn(async move {
                    client.handle_invoke_request(request).await;
                });
            }
            message if message.is_response() => {
                let request_id = match message.request_id() {
                    Some(id) => id.to_string(),
                    None => return,
                };
                match message.response_error().cloned() {
                    Some(error) => {
                        self.inner
                            .pending
                            .fail(&request_id, Error::from(error))
                            .await
                    }
                    None => self.inner.pending.complete(&request_id, message).await,
                }
            }
            other => {
                tracing::warn!(kind = other.kind(), "dropping unexpected message kind");
            }
        }
    }

    async fn handle_connect_response(&self, response: switchyard_core::ConnectResponse) {
        if let Some(error) = response.error {
            let error = Error::from(error);
            tracing::warn!(error = %error, "broker rejected handshake");
            self.record_error(&error);
            {
                let mut state = self.inner.state.lock().await;
                if *state != ConnectionState::Connecting {
                    return;
                }
                *state = ConnectionState::Closed;
            }
            self.set_state_metric(ConnectionState::Closed);
            self.inner.connected.reject(error);
            self.inner.closed.resolve(());
            return;
        }

        // Checked and transitioned under one lock hold: a reply arriving
        // after close() must not pull the client out of Closed
        {
            let mut state = self.inner.state.lock().await;
            if *state != ConnectionState::Connecting {
                tracing::debug!(state = ?*state, "dropping late handshake reply");
                return;
            }
            *state = ConnectionState::Connected;
        }
        {
            let mut client_id = self.inner.client_id.write().await;
            *client_id = response.client_id;
        }
        self.set_state_metric(ConnectionState::Connected);
        tracing::debug!("handshake complete");
        self.inner.connected.resolve(());
    }

    async fn handle_invoke_request(&self, request: InvokeRequest) {
        let endpoint = request.endpoint.clone();
        let context = MessageContext {
            source_id: request.source_id,
            correlation_id: request.correlation_id,
            scope: request.scope,
        };

        let outcome = match self.inner.endpoints.get(&endpoint).await {
            Some(handler) => {
                let call = AssertUnwindSafe(handler(endpoint.clone(), request.payload, context))
                    .catch_unwind()
                    .await;
                match call {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(endpoint = %endpoint, "endpoint handler panicked");
                        Err(Error::Protocol(ProtocolError::new(
                            "Error",
                            "endpoint handler panicked",
                        )))
                    }
                }
            }
            None => Err(Error::UnknownEndpoint(endpoint.clone())),
        };

        if let Some(metrics) = &self.inner.metrics {
            let status = if outcome.is_ok() { "success" } else { "error" };
            metrics.record_invocation(&endpoint, status);
        }

        let response = Message::InvokeResponse(InvokeResponse {
            request_id: request.request_id,
            payload: outcome.as_ref().ok().cloned().flatten(),
            error: outcome.as_ref().err().map(ProtocolError::from),
        });
        // Sent on the raw transport: an inbound invoke implies the handshake
        // already happened, and answering it must never start a new one
        if let Err(err) = self.inner.connection.send(response).await {
            tracing::warn!(endpoint = %endpoint, error = %err, "could not send invoke response");
        }
    }

    // --- outbound path ---

    async fn send_message(&self, message: Message) -> Result<()> {
        self.connect().await?;
        self.inner.connection.send(message).await
    }

    /// Register, send, await. A send failure rolls the registration back so
    /// the table never leaks entries for requests that were never on the
    /// wire.
    async fn send_request(&self, request_id: &str, message: Message) -> Result<Message> {
        let kind = message.kind();
        let started = Instant::now();
        let rx = self.inner.pending.register(request_id).await;

        if let Err(err) = self.send_message(message).await {
            self.inner.pending.remove(request_id).await;
            self.record_request(kind, "send_error", started);
            return Err(err);
        }

        let outcome = match rx.await {
            Ok(result) => result,
            // Sender dropped without settling: teardown raced us
            Err(_) => Err(Error::ConnectionAborted),
        };
        let status = if outcome.is_ok() { "success" } else { "error" };
        self.record_request(kind, status, started);
        outcome
    }

    // --- subscription teardown ---

    async fn remove_subscriber(&self, topic: &str, subscriber_id: u64) -> Result<()> {
        let settled = {
            let mut topics = self.inner.topics.lock().await;
            let remaining = match topics.get_mut(topic) {
                Some(entry) => entry.unsubscribe(subscriber_id),
                // Already removed, or the client was torn down
                None => None,
            };
            match remaining {
                Some(0) => {}
                _ => return Ok(()),
            }

            // Last subscriber: tear down the broker subscription. The
            // deferred goes in while the topics lock that observed the zero
            // count is still held, so a concurrent subscribe() cannot slip
            // between the decision and the registration; it blocks on the
            // deferred until the round trip settles.
            let settled = Deferred::new();
            self.inner
                .pending_unsubscribe
                .lock()
                .await
                .insert(topic.to_string(), settled.clone());
            settled
        };

        let request_id = self.inner.pending.next_id().await;
        let message = Message::Unsubscribe(UnsubscribeRequest {
            request_id: request_id.clone(),
            topic: topic.to_string(),
        });
        let result = self.send_request(&request_id, message).await;

        match &result {
            Ok(_) => {
                // No new subscriber can have appeared while the deferred
                // was pending, so the empty entry can go
                let mut topics = self.inner.topics.lock().await;
                let still_empty = topics
                    .get(topic)
                    .map(|entry| entry.subscriber_count() == 0)
                    .unwrap_or(false);
                if still_empty {
                    topics.remove(topic);
                }
            }
            Err(err) => {
                tracing::warn!(topic = %topic, error = %err, "unsubscribe request failed");
            }
        }

        // Entry out of the map before waking waiters, so a woken subscribe
        // does not re-observe the settled deferred
        self.inner.pending_unsubscribe.lock().await.remove(topic);
        settled.resolve(());
        result.map(|_| ())
    }

    // --- teardown ---

    /// Single teardown path. `error` is `None` for a caller-initiated
    /// close, `Some` when the transport failed underneath us; it decides
    /// whether subscribers see completion or an error.
    async fn close_core(&self, error: Option<Error>) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            match *state {
                ConnectionState::Created => {
                    // Nothing was started, so nothing to tear down
                    *state = ConnectionState::Closed;
                    drop(state);
                    self.set_state_metric(ConnectionState::Closed);
                    self.inner.connected.reject(Error::ConnectionClosed);
                    self.inner.closed.resolve(());
                    return Ok(());
                }
                ConnectionState::Connecting => {
                    // The handshake opened the transport, so unlike Created
                    // this path still has a connection to close
                    *state = ConnectionState::Closed;
                    drop(state);
                    self.set_state_metric(ConnectionState::Closed);
                    let broadcast = error.clone().unwrap_or(Error::ConnectionClosed);
                    self.inner.connected.reject(broadcast.clone());
                    self.inner.pending.fail_all(broadcast).await;
                    if let Err(err) = self.inner.connection.close().await {
                        tracing::warn!(error = %err, "transport close failed");
                    }
                    self.inner.closed.resolve(());
                    return Ok(());
                }
                ConnectionState::Closing => {
                    drop(state);
                    // Another task is already tearing down; wait it out
                    return self.inner.closed.wait().await;
                }
                ConnectionState::Closed => return Ok(()),
                ConnectionState::Connected => {
                    *state = ConnectionState::Closing;
                }
            }
        }
        self.set_state_metric(ConnectionState::Closing);

        let broadcast = error.clone().unwrap_or(Error::ConnectionClosed);
        self.inner.pending.fail_all(broadcast.clone()).await;
        self.settle_pending_unsubscriptions().await;
        self.fail_subscribers(error).await;

        if let Err(err) = self.inner.connection.close().await {
            tracing::warn!(error = %err, "transport close failed");
        }

        {
            let mut state = self.inner.state.lock().await;
            *state = ConnectionState::Closed;
        }
        self.set_state_metric(ConnectionState::Closed);
        tracing::debug!("client closed");
        self.inner.closed.resolve(());
        Ok(())
    }

    /// Terminate every topic: error on abnormal teardown, completion on a
    /// normal close. Each subscriber hears about it exactly once.
    async fn fail_subscribers(&self, error: Option<Error>) {
        let mut topics = self.inner.topics.lock().await;
        for (_, topic) in topics.iter_mut() {
            match &error {
                Some(err) => topic.error(err.clone()),
                None => topic.complete(),
            }
        }
        topics.clear();
    }

    async fn settle_pending_unsubscriptions(&self) {
        let mut pending = self.inner.pending_unsubscribe.lock().await;
        for (_, settled) in pending.drain() {
            settled.resolve(());
        }
    }

    // --- metrics helpers ---

    fn set_state_metric(&self, state: ConnectionState) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.update_connection_state(state.as_metric());
        }
    }

    fn record_request(&self, kind: &str, status: &str, started: Instant) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_request(kind, status, started.elapsed().as_secs_f64());
        }
    }

    fn record_error(&self, error: &Error) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_error(error.name());
        }
    }
}
