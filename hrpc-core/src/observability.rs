//! OpenTelemetry bootstrap
//!
//! Wires the `tracing` macros used across hrpc to an OTLP collector: spans go
//! out through a batch span exporter, metrics through a periodic reader, and
//! every event is also printed locally as JSON.
//!
//! ```rust,no_run
//! use hrpc_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("calculator")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!     hrpc_core::init_observability(config).expect("observability");
//!
//!     // ... serve requests ...
//!
//!     hrpc_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter directives, take precedence over the configured level

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Boxed error returned by the bootstrap functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_METRIC_INTERVAL: Duration = Duration::from_secs(30);

// Providers installed by `init_observability`, flushed by `shutdown_observability`.
static PROVIDERS: Mutex<(Option<SdkTracerProvider>, Option<SdkMeterProvider>)> =
    Mutex::new((None, None));

/// Observability settings
///
/// Defaults: service name `hrpc`, crate version, endpoint from
/// `OTEL_EXPORTER_OTLP_ENDPOINT` (else `http://localhost:4317`), every signal
/// enabled, level from `RUST_LOG` (else `info`).
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: String,
    /// Export spans
    pub enable_traces: bool,
    /// Export metrics
    pub enable_metrics: bool,
    /// Emit structured logs
    pub enable_logs: bool,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// How often metrics are pushed to the collector
    pub metric_interval: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "hrpc".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metric_interval: DEFAULT_METRIC_INTERVAL,
        }
    }
}

impl ObservabilityConfig {
    /// Default configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable structured logs
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// Set the metric push interval
    pub fn with_metric_interval(mut self, interval: Duration) -> Self {
        self.metric_interval = interval;
        self
    }

    /// Whether anything is exported to the collector
    pub fn exports(&self) -> bool {
        self.enable_traces || self.enable_metrics
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global tracer provider, meter provider and tracing subscriber
///
/// Must be called at most once per process: the global subscriber can only be
/// set once.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

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

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .build();

    // The subscriber layer needs the tracer before the provider goes global.
    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider.clone());
    lock_providers().0 = Some(provider);
    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), BoxError> {
    use opentelemetry_sdk::metrics::PeriodicReader;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;
    let provider = SdkMeterProvider::builder()
        .with_reader(
            PeriodicReader::builder(exporter)
                .with_interval(config.metric_interval)
                .build(),
        )
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    lock_providers().1 = Some(provider);
    Ok(())
}

fn lock_providers(
) -> std::sync::MutexGuard<'static, (Option<SdkTracerProvider>, Option<SdkMeterProvider>)> {
    PROVIDERS
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });
    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending spans and metrics and stop the exporters
///
/// Safe to call when `init_observability` was never called, and more than once.
pub fn shutdown_observability() {
    let (tracer_provider, meter_provider) = std::mem::take(&mut *lock_providers());
    if tracer_provider.is_none() && meter_provider.is_none() {
        return;
    }
    tracing::info!("Shutting down OpenTelemetry");

    if let Some(provider) = tracer_provider {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter_provider {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "Meter provider shutdown failed");
        }
    }
}
