//! Prometheus metrics for the scan server.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticket_scans_total{result}` - Scan outcomes by result code
//! - `ticket_redemptions_total` - Successful `valid → used` transitions
//! - `ticket_scan_audit_failures_total` - Scan events that could not be written
//! - `ticket_store_transition_conflicts_total` - Conditional updates that lost
//!
//! ## Histograms
//! - `ticket_scan_duration_seconds` - End-to-end scan latency

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use ticket_scan_core::scan::{
    AUDIT_FAILURES_TOTAL, REDEMPTIONS_TOTAL, SCAN_DURATION_SECONDS, SCANS_TOTAL,
};

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Register metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(SCANS_TOTAL, "Total number of scans by result");
    describe_counter!(REDEMPTIONS_TOTAL, "Total number of tickets redeemed");
    describe_counter!(
        AUDIT_FAILURES_TOTAL,
        "Scan events that could not be written to the audit log"
    );
    describe_counter!(
        "ticket_store_transition_conflicts_total",
        "Conditional ticket updates that found the ticket already changed"
    );
    describe_histogram!(SCAN_DURATION_SECONDS, "Time taken to process a scan request");

    tracing::info!("Scan metrics registered");
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must run inside a tokio runtime.
///
/// # Errors
///
/// Returns [`BuildError`] if a recorder is already installed or the
/// listener cannot be configured.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    register_metrics();
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
