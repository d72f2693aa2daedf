use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for webhook processing.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_webhook_outcome(&self, outcome: &str) {
        counter!("webhook_events_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_webhook_duration(&self, duration_ms: f64) {
        histogram!("webhook_processing_duration_ms").record(duration_ms);
    }

    pub fn record_cache_operation(&self, operation: &str, duration_ms: f64, success: bool) {
        counter!("webhook_cache_operations_total", "operation" => operation.to_string(), "success" => success.to_string()).increment(1);
        histogram!("webhook_cache_operation_duration_ms", "operation" => operation.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    METRICS.get_or_init(Metrics::new);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("webhook_events_total", Unit::Count, "Webhook events by outcome");
    describe_histogram!("webhook_processing_duration_ms", Unit::Milliseconds, "End-to-end webhook processing latency in milliseconds");
    describe_counter!("webhook_cache_operations_total", Unit::Count, "Total cache store operations");
    describe_histogram!("webhook_cache_operation_duration_ms", Unit::Milliseconds, "Cache store operation latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
