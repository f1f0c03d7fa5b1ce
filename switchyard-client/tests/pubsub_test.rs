//! Pub/sub tests: topic subscription lifecycle, fan-out, wire traffic.

mod common;

use common::{ack, reject_with, MockConnection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::messages::TopicNotification;
use switchyard_core::{Error, Message};
use switchyard_client::{PublishOptions, RouterClient, RouterOptions, TopicMessage, TopicSubscriber};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn new_client() -> (Arc<MockConnection>, RouterClient) {
    let mock = Arc::new(MockConnection::new());
    mock.handle("Publish", ack);
    mock.handle("Subscribe", ack);
    mock.handle("Unsubscribe", ack);
    let client = RouterClient::new(mock.clone(), RouterOptions::new());
    (mock, client)
}

fn collecting_subscriber() -> (TopicSubscriber, mpsc::UnboundedReceiver<TopicMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscriber = TopicSubscriber::from_fn(move |msg| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(msg);
        }
    });
    (subscriber, rx)
}

fn notification(topic: &str, payload: serde_json::Value) -> Message {
    Message::Topic(TopicNotification {
        topic: topic.to_string(),
        payload: Some(payload),
        source_id: "other-client".to_string(),
        correlation_id: None,
        scope: None,
    })
}

#[tokio::test]
async fn test_publish_round_trip() {
    let (mock, client) = new_client();

    client
        .publish(
            "prices",
            Some(serde_json::json!({"bid": 1.08})),
            PublishOptions::default().with_correlation_id("corr-1"),
        )
        .await
        .unwrap();

    match &mock.sent_of_kind("Publish")[0] {
        Message::Publish(req) => {
            assert_eq!(req.topic, "prices");
            assert_eq!(req.payload, Some(serde_json::json!({"bid": 1.08})));
            assert_eq!(req.correlation_id.as_deref(), Some("corr-1"));
        }
        other => panic!("expected Publish, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_error_response_propagates() {
    let (mock, client) = new_client();
    mock.handle("Publish", reject_with("Error"));

    let result = client.publish("t", None, PublishOptions::default()).await;
    assert!(matches!(result, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn test_invalid_topic_name_rejected_locally() {
    let (mock, client) = new_client();

    let result = client
        .publish("has space", None, PublishOptions::default())
        .await;
    assert!(matches!(result, Err(Error::InvalidTopic(_))));
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn test_first_subscriber_opens_broker_subscription_once() {
    let (mock, client) = new_client();

    let (first, _rx1) = collecting_subscriber();
    let (second, _rx2) = collecting_subscriber();
    client.subscribe("news", first).await.unwrap();
    client.subscribe("news", second).await.unwrap();

    assert_eq!(mock.sent_of_kind("Subscribe").len(), 1);
}

#[tokio::test]
async fn test_topic_message_fans_out_with_context() {
    let (mock, client) = new_client();

    let (subscriber, mut rx) = collecting_subscriber();
    client.subscribe("news", subscriber).await.unwrap();

    mock.send_to_client(notification("news", serde_json::json!("headline")));

    let msg = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.topic, "news");
    assert_eq!(msg.payload, Some(serde_json::json!("headline")));
    assert_eq!(msg.context.source_id.as_deref(), Some("other-client"));
}

#[tokio::test]
async fn test_topic_message_order_preserved_per_subscriber() {
    let (mock, client) = new_client();

    let (subscriber, mut rx) = collecting_subscriber();
    client.subscribe("seq", subscriber).await.unwrap();

    for i in 0..5 {
        mock.send_to_client(notification("seq", serde_json::json!(i)));
    }

    for i in 0..5 {
        let msg = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, Some(serde_json::json!(i)));
    }
}

#[tokio::test]
async fn test_topic_message_without_subscriber_is_dropped() {
    let (mock, client) = new_client();
    client.connect().await.unwrap();

    mock.send_to_client(notification("nobody-home", serde_json::json!(1)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Client is still healthy
    client.publish("t", None, PublishOptions::default()).await.unwrap();
}

#[tokio::test]
async fn test_last_unsubscriber_closes_broker_subscription() {
    let (mock, client) = new_client();

    let (first, _rx1) = collecting_subscriber();
    let (second, _rx2) = collecting_subscriber();
    let sub1 = client.subscribe("news", first).await.unwrap();
    let sub2 = client.subscribe("news", second).await.unwrap();

    sub1.unsubscribe().await.unwrap();
    assert_eq!(mock.sent_of_kind("Unsubscribe").len(), 0);

    sub2.unsubscribe().await.unwrap();
    assert_eq!(mock.sent_of_kind("Unsubscribe").len(), 1);
}

#[tokio::test]
async fn test_resubscribe_after_unsubscribe_starts_fresh() {
    let (mock, client) = new_client();

    let (subscriber, _rx) = collecting_subscriber();
    let sub = client.subscribe("news", subscriber).await.unwrap();
    sub.unsubscribe().await.unwrap();

    let (subscriber, mut rx) = collecting_subscriber();
    client.subscribe("news", subscriber).await.unwrap();

    // Unsubscribe hit the wire before the second Subscribe
    let sent = mock.sent();
    let kinds: Vec<&str> = sent
        .iter()
        .map(|m| m.kind())
        .filter(|k| *k == "Subscribe" || *k == "Unsubscribe")
        .collect();
    assert_eq!(kinds, vec!["Subscribe", "Unsubscribe", "Subscribe"]);

    // And the new subscription is live
    mock.send_to_client(notification("news", serde_json::json!("again")));
    let msg = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.payload, Some(serde_json::json!("again")));
}

#[tokio::test]
async fn test_subscribe_failure_rolls_back_topic() {
    let (mock, client) = new_client();
    mock.handle("Subscribe", reject_with("Error"));

    let (subscriber, _rx) = collecting_subscriber();
    let result = client.subscribe("news", subscriber).await;
    assert!(result.is_err());

    // The topic was rolled back, so a retry opens a fresh subscription
    mock.handle("Subscribe", ack);
    let (subscriber, _rx) = collecting_subscriber();
    client.subscribe("news", subscriber).await.unwrap();
    assert_eq!(mock.sent_of_kind("Subscribe").len(), 2);
}

#[tokio::test]
async fn test_failed_unsubscribe_keeps_wire_subscription() {
    let (mock, client) = new_client();
    mock.handle("Unsubscribe", reject_with("Error"));

    let (subscriber, _rx) = collecting_subscriber();
    let sub = client.subscribe("news", subscriber).await.unwrap();
    assert!(sub.unsubscribe().await.is_err());

    // The broker still considers us subscribed, so resubscribing must not
    // send a second Subscribe
    let (subscriber, mut rx) = collecting_subscriber();
    client.subscribe("news", subscriber).await.unwrap();
    assert_eq!(mock.sent_of_kind("Subscribe").len(), 1);

    mock.send_to_client(notification("news", serde_json::json!("still here")));
    let msg = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.payload, Some(serde_json::json!("still here")));
}

#[tokio::test]
async fn test_concurrent_unsubscribe_and_subscribe_keep_wire_balanced() {
    let (mock, client) = new_client();

    // Race the last unsubscriber against a fresh subscriber. Whichever wins,
    // the broker must never be left unsubscribed while a local subscriber
    // exists, so every Subscribe that went out is matched by an Unsubscribe
    // once the topic really empties.
    for _ in 0..25 {
        let (first, _rx1) = collecting_subscriber();
        let sub = client.subscribe("races", first).await.unwrap();

        let (second, _rx2) = collecting_subscriber();
        let resubscribe = {
            let client = client.clone();
            tokio::spawn(async move { client.subscribe("races", second).await })
        };
        let (unsubscribed, resubscribed) = tokio::join!(sub.unsubscribe(), resubscribe);
        unsubscribed.unwrap();

        let survivor = resubscribed.unwrap().unwrap();
        survivor.unsubscribe().await.unwrap();
    }

    assert_eq!(
        mock.sent_of_kind("Subscribe").len(),
        mock.sent_of_kind("Unsubscribe").len()
    );
}

#[tokio::test]
async fn test_close_completes_subscribers() {
    let (_mock, client) = new_client();

    let completions = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let complete_counter = completions.clone();
    let error_counter = errors.clone();
    client
        .subscribe(
            "news",
            TopicSubscriber::new()
                .on_complete(move || {
                    complete_counter.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    error_counter.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .await
        .unwrap();

    client.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subscriber_can_publish_reentrantly() {
    let (mock, client) = new_client();

    let publisher = client.clone();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    client
        .subscribe(
            "inbound",
            TopicSubscriber::from_fn(move |msg| {
                let client = publisher.clone();
                let done = done_tx.clone();
                async move {
                    let result = client
                        .publish("outbound", msg.payload, PublishOptions::default())
                        .await;
                    let _ = done.send(result);
                }
            }),
        )
        .await
        .unwrap();

    mock.send_to_client(notification("inbound", serde_json::json!("relay")));

    let result = timeout(Duration::from_secs(1), done_rx.recv())
        .await
        .unwrap()
        .unwrap();
    result.unwrap();
    assert_eq!(mock.sent_of_kind("Publish").len(), 1);
}
