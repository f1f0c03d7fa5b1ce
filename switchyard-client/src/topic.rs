//! Topic state and subscriber fan-out
//!
//! One [`Topic`] exists per topic name the client is subscribed to. It owns
//! the subscriber list and a terminal flag: once the topic has delivered an
//! error or a completion it drops all later events. Terminal topics never
//! linger in the client's registry, so subscribers are only added to live
//! ones.
//!
//! # Delivery Model
//!
//! Each subscriber gets an unbounded queue and a dedicated delivery task.
//! Fan-out enqueues; the task dequeues and runs the subscriber's callbacks.
//! Consequences:
//!
//! - Per-subscriber ordering matches arrival order
//! - A slow subscriber delays only itself, never its siblings or the
//!   client's dispatcher
//! - A subscriber calling back into the client (publish from inside a
//!   message callback) cannot deadlock, because delivery never runs under
//!   the client's locks
//! - A panicking callback is caught and logged; the subscription survives
//!
//! The error and complete events are terminal: the delivery task fires the
//! matching callback once and exits.

use crate::options::TopicMessage;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use switchyard_core::Error;
use tokio::sync::mpsc;

/// Async message callback: runs once per delivered topic message.
pub type NextHandler = Arc<dyn Fn(TopicMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Terminal error callback.
pub type SubscriberErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Terminal completion callback.
pub type CompleteHandler = Arc<dyn Fn() + Send + Sync>;

/// A subscriber's callback set. All callbacks are optional; a subscriber
/// with no `next` callback still counts toward the topic's subscriber
/// count (and thus keeps the broker subscription alive).
#[derive(Clone, Default)]
pub struct TopicSubscriber {
    next: Option<NextHandler>,
    error: Option<SubscriberErrorHandler>,
    complete: Option<CompleteHandler>,
}

impl TopicSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for the common case of a message callback
    /// only.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(TopicMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self::new().on_message(f)
    }

    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TopicMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.next = Some(Arc::new(move |msg| Box::pin(f(msg))));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(f));
        self
    }
}

enum SubscriberEvent {
    Next(TopicMessage),
    Error(Error),
    Complete,
}

struct SubscriberEntry {
    id: u64,
    events: mpsc::UnboundedSender<SubscriberEvent>,
}

/// Per-topic subscriber registry with terminal error/complete semantics
pub struct Topic {
    name: String,
    subscribers: Vec<SubscriberEntry>,
    next_subscriber_id: u64,
    completed: bool,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            completed: false,
        }
    }

    /// Add a subscriber and spawn its delivery task. Returns the subscriber
    /// id.
    pub fn subscribe(&mut self, subscriber: TopicSubscriber) -> u64 {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(SubscriberEntry { id, events: tx });
        spawn_delivery_task(self.name.clone(), id, subscriber, rx);

        id
    }

    /// Remove a subscriber. Returns the number of subscribers remaining,
    /// or `None` if the id was not present (already removed or terminal).
    pub fn unsubscribe(&mut self, subscriber_id: u64) -> Option<usize> {
        let index = self.subscribers.iter().position(|s| s.id == subscriber_id)?;
        // Dropping the sender ends the delivery task once its queue drains
        self.subscribers.remove(index);
        Some(self.subscribers.len())
    }

    /// Fan a message out to every subscriber. Dropped silently after the
    /// topic has terminated.
    pub fn publish(&self, message: TopicMessage) {
        if self.completed {
            return;
        }
        for subscriber in &self.subscribers {
            let _ = subscriber
                .events
                .send(SubscriberEvent::Next(message.clone()));
        }
    }

    /// Terminate the topic with an error. Each subscriber's error callback
    /// fires at most once; later publish/error/complete calls are no-ops.
    pub fn error(&mut self, error: Error) {
        if self.completed {
            return;
        }
        self.completed = true;
        for subscriber in self.subscribers.drain(..) {
            let _ = subscriber.events.send(SubscriberEvent::Error(error.clone()));
        }
    }

    /// Terminate the topic normally.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        for subscriber in self.subscribers.drain(..) {
            let _ = subscriber.events.send(SubscriberEvent::Complete);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

fn spawn_delivery_task(
    topic: String,
    subscriber_id: u64,
    subscriber: TopicSubscriber,
    mut rx: mpsc::UnboundedReceiver<SubscriberEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SubscriberEvent::Next(message) => {
                    if let Some(next) = &subscriber.next {
                        let delivery = AssertUnwindSafe(next(message)).catch_unwind();
                        if delivery.await.is_err() {
                            tracing::warn!(
                                topic = %topic,
                                subscriber_id,
                                "subscriber callback panicked"
                            );
                        }
                    }
                }
                SubscriberEvent::Error(error) => {
                    if let Some(on_error) = &subscriber.error {
                        on_error(error);
                    }
                    break;
                }
                SubscriberEvent::Complete => {
                    if let Some(on_complete) = &subscriber.complete {
                        on_complete();
                    }
                    break;
                }
            }
        }
    });
}
