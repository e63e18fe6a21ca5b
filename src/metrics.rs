//! Prometheus metrics for case operations and store latency.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

// === Metric Name Constants ===

/// Store call latency metric name.
pub const METRIC_STORE_LATENCY: &str = "store_request_latency_ms";
/// Cases created counter metric name.
pub const METRIC_CASES_CREATED: &str = "cases_created_total";
/// Cases updated counter metric name.
pub const METRIC_CASES_UPDATED: &str = "cases_updated_total";
/// Store failures counter metric name.
pub const METRIC_STORE_FAILURES: &str = "store_failures_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_STORE_LATENCY,
        "Document store request latency in milliseconds"
    );
    describe_counter!(METRIC_CASES_CREATED, "Total number of cases created");
    describe_counter!(METRIC_CASES_UPDATED, "Total number of cases updated");
    describe_counter!(
        METRIC_STORE_FAILURES,
        "Total number of failed document store requests"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder with a scrape endpoint on `port`.
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Increment cases created counter.
pub fn inc_cases_created() {
    counter!(METRIC_CASES_CREATED).increment(1);
}

/// Increment cases updated counter.
pub fn inc_cases_updated() {
    counter!(METRIC_CASES_UPDATED).increment(1);
}

/// Increment store failures counter.
pub fn inc_store_failures(operation: &'static str) {
    counter!(METRIC_STORE_FAILURES, "operation" => operation).increment(1);
}

/// RAII guard for timing store calls.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    operation: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for a store operation.
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(METRIC_STORE_LATENCY, "operation" => self.operation).record(self.elapsed_ms());
    }
}

/// Create a latency timer for a store operation.
pub fn timer_store(operation: &'static str) -> LatencyTimer {
    LatencyTimer::new(operation)
}
