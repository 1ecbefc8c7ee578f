//! Server metrics definitions
//!
//! OpenTelemetry instruments recorded by the dispatch pipeline when
//! observability is enabled on the builder. They are exported through the
//! global meter provider installed by `hrpc_core::init_observability`.
//!
//! # Metrics Collected
//!
//! - **requests_total**: dispatched requests, by method and status (counter)
//! - **request_duration**: time spent in the pipeline, seconds (histogram)
//! - **errors_total**: failed calls, by error kind (counter)
//! - **registered_methods**: size of the dispatch table (gauge)
//!
//! # Examples
//!
//! ```rust,no_run
//! use hrpc_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("calculator");
//! metrics.record_request("Arith.Multiply", 200, 0.004);
//! metrics.record_error("method_not_found");
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Server metrics for monitoring
///
/// All metrics are prefixed with `hrpc.server.*`.
pub struct ServerMetrics {
    /// Total number of requests processed
    pub requests_total: Counter<u64>,
    /// Request processing duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of failed calls
    pub errors_total: Counter<u64>,
    /// Number of registered methods
    pub registered_methods: Gauge<u64>,
}

impl ServerMetrics {
    /// Create metrics on the global meter named `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("hrpc.server.requests.total")
                .with_description("Total number of requests processed")
                .build(),
            request_duration: meter
                .f64_histogram("hrpc.server.request.duration")
                .with_description("Request processing duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("hrpc.server.errors.total")
                .with_description("Total number of failed calls")
                .build(),
            registered_methods: meter
                .u64_gauge("hrpc.server.registered.methods")
                .with_description("Number of registered methods")
                .build(),
        }
    }

    /// Record a finished request
    pub fn record_request(&self, method: &str, status: u16, duration_secs: f64) {
        let attributes = [
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", i64::from(status)),
        ];
        self.requests_total.add(1, &attributes);
        self.request_duration.record(duration_secs, &attributes);
    }

    /// Record a failed call
    pub fn record_error(&self, kind: &'static str) {
        self.errors_total.add(1, &[KeyValue::new("kind", kind)]);
    }

    /// Record the current size of the dispatch table
    pub fn record_registered(&self, count: usize) {
        self.registered_methods.record(count as u64, &[]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}
