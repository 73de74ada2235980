use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and return its render handle. Safe to
/// call more than once (tests share one recorder per process).
pub fn install_recorder() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

// ---------------------------------------------------------------------------
// Metrics catalog
// ---------------------------------------------------------------------------

/// Register all metric descriptors at startup, before anything records.
pub fn describe_all_metrics() {
    describe_counter!(
        "depot_delivery_requests_total",
        "HTTP requests by route class and status class"
    );
    describe_counter!(
        "depot_delivery_bytes_sent_total",
        "Total file bytes served to clients"
    );
    describe_histogram!(
        "depot_delivery_request_duration_seconds",
        "Request latency by route class"
    );
    describe_histogram!(
        "depot_storage_op_duration_seconds",
        "Object-store call latency by operation"
    );
    describe_counter!(
        "depot_storage_errors_total",
        "Object-store call failures by operation"
    );
    describe_counter!(
        "depot_link_lookups_total",
        "Short-link resolutions by outcome"
    );
    describe_gauge!("depot_uptime_seconds", "Process uptime");
    describe_counter!("depot_panic_total", "Total panics caught (should stay 0)");
}

// ---------------------------------------------------------------------------
// Recording helpers
// ---------------------------------------------------------------------------

pub fn inc_delivery_request(route: &'static str, status: u16) {
    let class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    counter!("depot_delivery_requests_total", "route" => route, "status" => class).increment(1);
}

pub fn add_delivery_bytes_sent(bytes: u64) {
    counter!("depot_delivery_bytes_sent_total").increment(bytes);
}

pub fn record_delivery_request_duration(route: &'static str, seconds: f64) {
    histogram!("depot_delivery_request_duration_seconds", "route" => route).record(seconds);
}

pub fn record_storage_op_duration(op: &'static str, seconds: f64) {
    histogram!("depot_storage_op_duration_seconds", "op" => op).record(seconds);
}

pub fn inc_storage_error(op: &'static str) {
    counter!("depot_storage_errors_total", "op" => op).increment(1);
}

pub fn inc_link_lookup(outcome: &'static str) {
    counter!("depot_link_lookups_total", "outcome" => outcome).increment(1);
}

pub fn inc_panic_total() {
    counter!("depot_panic_total").increment(1);
}

/// Periodically refresh the uptime gauge until shutdown.
pub async fn run_uptime_task(start: Instant, cancel: CancellationToken) {
    let interval = std::time::Duration::from_secs(15);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {
                gauge!("depot_uptime_seconds").set(start.elapsed().as_secs_f64());
            }
        }
    }
}
