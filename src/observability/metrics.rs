//! Metrics for the tap itself.
//!
//! # Metrics
//! - `http_tap_transactions_total` (counter): captured transactions by method, status
//! - `http_tap_response_time_seconds` (histogram): handler latency
//! - `http_tap_status_decode_failures_total` (counter): undecodable status lines
//! - `http_tap_sink_failures_total` (counter): failed writes by sink (udp, file)
//! - `http_tap_publish_failures_total` (counter): records the publisher rejected
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::transaction::TransactionRecord;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_transaction(record: &TransactionRecord) {
    let method = record.method.clone().unwrap_or_else(|| "-".to_string());
    let status = record.status.map(|s| s.as_str()).unwrap_or("undecoded");

    counter!("http_tap_transactions_total", "method" => method, "status" => status).increment(1);
    histogram!("http_tap_response_time_seconds").record(record.responsetime as f64 / 1e6);
}

pub fn record_decode_failure() {
    counter!("http_tap_status_decode_failures_total").increment(1);
}

pub fn record_sink_failure(sink: &'static str) {
    counter!("http_tap_sink_failures_total", "sink" => sink).increment(1);
}

pub fn record_publish_failure() {
    counter!("http_tap_publish_failures_total").increment(1);
}
