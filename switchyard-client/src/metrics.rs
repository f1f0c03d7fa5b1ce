//! Client metrics definitions
//!
//! This module defines OpenTelemetry metrics for monitoring client health
//! and performance. Metrics are exported to the configured observability
//! backend.
//!
//! # Metrics Collected
//!
//! - **connection_state**: Current connection state (gauge)
//! - **requests_total**: Total requests sent (counter)
//! - **request_duration**: Request latency distribution (histogram)
//! - **errors_total**: Total errors encountered (counter)
//! - **topic_messages_received**: Topic messages received (counter)
//! - **invocations_handled**: Inbound invokes dispatched to local handlers (counter)

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=created, 1=connecting, 2=connected, 3=closing, 4=closed)
    pub connection_state: Gauge<i64>,
    /// Total number of requests sent
    pub requests_total: Counter<u64>,
    /// Request duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
    /// Total number of topic messages received
    pub topic_messages_received: Counter<u64>,
    /// Total number of inbound invokes handled locally
    pub invocations_handled: Counter<u64>,
}

impl ClientMetrics {
    /// Create a new ClientMetrics instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new ClientMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("switchyard.client.connection.state")
                .with_description("Connection state (0=created, 1=connecting, 2=connected, 3=closing, 4=closed)")
                .build(),
            requests_total: meter
                .u64_counter("switchyard.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("switchyard.client.request.duration")
                .with_description("Request duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("switchyard.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            topic_messages_received: meter
                .u64_counter("switchyard.client.topic.messages.received")
                .with_description("Total number of topic messages received")
                .build(),
            invocations_handled: meter
                .u64_counter("switchyard.client.invocations.handled")
                .with_description("Total number of inbound invokes handled locally")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    /// Record a request
    pub fn record_request(&self, kind: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a topic message received
    pub fn record_topic_message(&self, topic: &str) {
        let attributes = &[KeyValue::new("topic", topic.to_string())];
        self.topic_messages_received.add(1, attributes);
    }

    /// Record an inbound invoke dispatched to a local handler
    pub fn record_invocation(&self, endpoint: &str, status: &str) {
        let attributes = &[
            KeyValue::new("endpoint", endpoint.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.invocations_handled.add(1, attributes);
    }
}
