//! Prometheus Metrics Module
//!
//! Exposes engine metrics in Prometheus format on a dedicated port.
//!
//! # Metrics Categories
//!
//! - **Feed**: tick counts and connection state
//! - **Reconciliation**: reconcile cycles and ticked symbol counts
//! - **Slow path**: universe size, reference backfill, volume polls

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics initialization error.
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus recorder: {0}")]
pub struct MetricsError(String);

/// Install the Prometheus recorder and start the scrape endpoint.
///
/// A port of 0 installs the recorder without an HTTP listener, which
/// keeps metric recording cheap but unscrapeable. Idempotent: repeated
/// calls return the handle installed first.
///
/// Must be called from within a Tokio runtime when a listener port is
/// given; the exporter runs as a background task.
pub fn init_metrics(port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = if port == 0 {
        PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError(e.to_string()))?
    } else {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .build()
            .map_err(|e| MetricsError(e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| MetricsError(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(error) = exporter.await {
                tracing::error!(?error, "Prometheus exporter stopped");
            }
        });
        handle
    };

    register_metrics();
    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    // Feed
    describe_counter!(
        "heatmap_feed_ticks_total",
        "Total trade ticks received from the feed"
    );
    describe_gauge!(
        "heatmap_feed_connected",
        "Whether the tick feed is connected (1) or not (0)"
    );

    // Reconciliation
    describe_counter!(
        "heatmap_reconciles_total",
        "Total reconcile cycles that published a snapshot"
    );
    describe_gauge!(
        "heatmap_ticked_symbols",
        "Symbols with at least one tick at the last reconcile"
    );

    // Slow path
    describe_gauge!("heatmap_universe_size", "Securities in the loaded universe");
    describe_gauge!(
        "heatmap_reference_prices",
        "Symbols with a backfilled previous close"
    );
    describe_counter!(
        "heatmap_backfill_failures_total",
        "Reference backfills that exhausted their retries"
    );
    describe_counter!("heatmap_volume_polls_total", "Successful volume polls");
    describe_counter!(
        "heatmap_volume_poll_failures_total",
        "Volume polls that failed and kept cached values"
    );
}
