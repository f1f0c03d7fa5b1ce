//! Common test utilities for switchyard-client integration tests
//!
//! Provides a scriptable in-memory [`Connection`] so client behavior can be
//! tested without a broker: per-message-kind responders, direct server push,
//! and transport error/close injection.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use switchyard_client::{CloseCallback, Connection, ErrorCallback, MessageCallback};
use switchyard_core::messages::ConnectResponse;
use switchyard_core::{Error, Message, ProtocolError, Result};

type Responder = Box<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

/// Scriptable mock transport
///
/// By default it answers the handshake with `clientId: "client-id"`.
/// Responses for other message kinds are installed with [`handle`];
/// kinds without a responder are recorded and left unanswered.
pub struct MockConnection {
    callbacks: Mutex<Callbacks>,
    responders: Mutex<HashMap<&'static str, Responder>>,
    sent: Mutex<Vec<Message>>,
    connect_called: AtomicBool,
    close_called: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Self {
        let mock = Self {
            callbacks: Mutex::new(Callbacks::default()),
            responders: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            connect_called: AtomicBool::new(false),
            close_called: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        };
        mock.handle("Connect", |_| {
            Some(Message::ConnectResponse(ConnectResponse {
                client_id: Some("client-id".to_string()),
                error: None,
            }))
        });
        mock
    }

    /// Install (or replace) the responder for one message kind.
    pub fn handle<F>(&self, kind: &'static str, responder: F)
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap()
            .insert(kind, Box::new(responder));
    }

    /// Push a message to the client, as the broker would.
    pub fn send_to_client(&self, message: Message) {
        let callbacks = self.callbacks.lock().unwrap();
        if let Some(on_message) = &callbacks.on_message {
            on_message(message);
        }
    }

    /// Inject a transport error event.
    pub fn raise_error(&self, error: Error) {
        let callbacks = self.callbacks.lock().unwrap();
        if let Some(on_error) = &callbacks.on_error {
            on_error(error);
        }
    }

    /// Inject a transport close event.
    pub fn raise_close(&self, reason: Option<Error>) {
        let callbacks = self.callbacks.lock().unwrap();
        if let Some(on_close) = &callbacks.on_close {
            on_close(reason);
        }
    }

    /// Everything the client has sent, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_kind(&self, kind: &str) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter(|m| m.kind() == kind)
            .collect()
    }

    /// Wait until the client has sent `count` messages of the given kind,
    /// returning them. Panics after two seconds.
    pub async fn wait_for_sent(&self, kind: &str, count: usize) -> Vec<Message> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let matching = self.sent_of_kind(kind);
            if matching.len() >= count {
                return matching;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {} {} message(s), sent so far: {:?}",
                    count,
                    kind,
                    self.sent()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn connect_called(&self) -> bool {
        self.connect_called.load(Ordering::SeqCst)
    }

    pub fn close_called(&self) -> bool {
        self.close_called.load(Ordering::SeqCst)
    }

    /// Make every subsequent `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn connect(&self) -> Result<()> {
        self.connect_called.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed("send failed".to_string()));
        }

        self.sent.lock().unwrap().push(message.clone());

        let response = {
            let responders = self.responders.lock().unwrap();
            responders.get(message.kind()).and_then(|r| r(&message))
        };
        if let Some(response) = response {
            self.send_to_client(response);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_called.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_message(&self, callback: MessageCallback) {
        self.callbacks.lock().unwrap().on_message = Some(callback);
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.callbacks.lock().unwrap().on_error = Some(callback);
    }

    fn on_close(&self, callback: CloseCallback) {
        self.callbacks.lock().unwrap().on_close = Some(callback);
    }
}

/// Responder helper: acknowledge any request kind with an empty success
/// response of the matching kind.
pub fn ack(message: &Message) -> Option<Message> {
    use switchyard_core::messages::*;
    let request_id = message.request_id()?.to_string();
    Some(match message {
        Message::Publish(_) => Message::PublishResponse(PublishResponse {
            request_id,
            error: None,
        }),
        Message::Subscribe(_) => Message::SubscribeResponse(SubscribeResponse {
            request_id,
            error: None,
        }),
        Message::Unsubscribe(_) => Message::UnsubscribeResponse(UnsubscribeResponse {
            request_id,
            error: None,
        }),
        Message::RegisterService(_) => Message::RegisterServiceResponse(RegisterServiceResponse {
            request_id,
            error: None,
        }),
        Message::UnregisterService(_) => {
            Message::UnregisterServiceResponse(UnregisterServiceResponse {
                request_id,
                error: None,
            })
        }
        _ => return None,
    })
}

/// Responder helper: reject any request kind with an error response of the
/// matching kind.
pub fn reject_with(name: &str) -> impl Fn(&Message) -> Option<Message> {
    use switchyard_core::messages::*;
    let error = ProtocolError::from_name(name.to_string());
    move |message: &Message| {
        let request_id = message.request_id()?.to_string();
        let error = Some(error.clone());
        Some(match message {
            Message::Publish(_) => {
                Message::PublishResponse(PublishResponse { request_id, error })
            }
            Message::Subscribe(_) => {
                Message::SubscribeResponse(SubscribeResponse { request_id, error })
            }
            Message::Unsubscribe(_) => {
                Message::UnsubscribeResponse(UnsubscribeResponse { request_id, error })
            }
            Message::Invoke(_) => Message::InvokeResponse(InvokeResponse {
                request_id,
                payload: None,
                error,
            }),
            Message::RegisterService(_) => {
                Message::RegisterServiceResponse(RegisterServiceResponse { request_id, error })
            }
            Message::UnregisterService(_) => {
                Message::UnregisterServiceResponse(UnregisterServiceResponse { request_id, error })
            }
            _ => return None,
        })
    }
}
