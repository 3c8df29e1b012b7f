//! Prometheus metrics HTTP server.
//!
//! Exposes relay statistics in Prometheus text format via HTTP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::RelayStats;

/// Start the Prometheus metrics HTTP server.
///
/// Runs in the background and serves metrics at `/metrics`.
/// Returns an error if the server fails to bind to the port.
pub async fn start_metrics_server(
    port: u16,
    stats: Arc<RelayStats>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(stats);

    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(stats): State<Arc<RelayStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &RelayStats) -> String {
    let summary = stats.summary();
    let mut output = String::with_capacity(4096);

    // Uptime
    output.push_str("# HELP lda_relay_uptime_seconds Time since the relay started\n");
    output.push_str("# TYPE lda_relay_uptime_seconds gauge\n");
    output.push_str(&format!(
        "lda_relay_uptime_seconds {:.3}\n",
        summary.elapsed_secs
    ));

    // Datagram counters
    output.push_str("# HELP lda_relay_datagrams_total Datagrams received on the UDP socket\n");
    output.push_str("# TYPE lda_relay_datagrams_total counter\n");
    output.push_str(&format!(
        "lda_relay_datagrams_total {}\n",
        summary.datagrams_received
    ));

    output.push_str("# HELP lda_relay_empty_datagrams_total Empty datagrams dropped before parsing\n");
    output.push_str("# TYPE lda_relay_empty_datagrams_total counter\n");
    output.push_str(&format!(
        "lda_relay_empty_datagrams_total {}\n",
        summary.empty_datagrams
    ));

    // Drop counters per pipeline stage
    output.push_str("# HELP lda_relay_drops_total Datagrams dropped before submission\n");
    output.push_str("# TYPE lda_relay_drops_total counter\n");
    output.push_str(&format!(
        "lda_relay_drops_total{{stage=\"parse\"}} {}\n",
        summary.parse_failures
    ));
    output.push_str(&format!(
        "lda_relay_drops_total{{stage=\"validate\"}} {}\n",
        summary.validation_failures
    ));
    output.push_str(&format!(
        "lda_relay_drops_total{{stage=\"map\"}} {}\n",
        summary.mapping_failures
    ));

    // Accepted QSOs
    output.push_str("# HELP lda_relay_qsos_total QSOs accepted by the pipeline\n");
    output.push_str("# TYPE lda_relay_qsos_total counter\n");
    output.push_str(&format!("lda_relay_qsos_total {}\n", summary.qsos_accepted));

    // Submission outcomes
    output.push_str("# HELP lda_relay_submissions_total Submission attempts by outcome\n");
    output.push_str("# TYPE lda_relay_submissions_total counter\n");
    output.push_str(&format!(
        "lda_relay_submissions_total{{outcome=\"ok\"}} {}\n",
        summary.submissions_ok
    ));
    output.push_str(&format!(
        "lda_relay_submissions_total{{outcome=\"failed\"}} {}\n",
        summary.submissions_failed
    ));

    // Bind failures
    output.push_str("# HELP lda_relay_bind_failures_total Socket bind failures\n");
    output.push_str("# TYPE lda_relay_bind_failures_total counter\n");
    output.push_str(&format!(
        "lda_relay_bind_failures_total {}\n",
        summary.bind_failures
    ));

    // Bytes received
    output.push_str("# HELP lda_relay_bytes_received_total Total bytes of raw input processed\n");
    output.push_str("# TYPE lda_relay_bytes_received_total counter\n");
    output.push_str(&format!(
        "lda_relay_bytes_received_total {}\n",
        summary.bytes_received
    ));

    // QSOs by band
    output.push_str("# HELP lda_relay_qsos_by_band_total Accepted QSOs broken down by band\n");
    output.push_str("# TYPE lda_relay_qsos_by_band_total counter\n");
    for (band, count) in &summary.qsos_by_band {
        output.push_str(&format!(
            "lda_relay_qsos_by_band_total{{band=\"{}\"}} {}\n",
            band, count
        ));
    }

    // QSOs by mode
    output.push_str("# HELP lda_relay_qsos_by_mode_total Accepted QSOs broken down by mode\n");
    output.push_str("# TYPE lda_relay_qsos_by_mode_total counter\n");
    for (mode, count) in &summary.qsos_by_mode {
        output.push_str(&format!(
            "lda_relay_qsos_by_mode_total{{mode=\"{}\"}} {}\n",
            mode, count
        ));
    }

    // Submission latency summary
    if let Some(ref latency) = summary.latency_percentiles {
        output.push_str("# HELP lda_relay_submit_latency_ms Submission round-trip latency\n");
        output.push_str("# TYPE lda_relay_submit_latency_ms summary\n");
        output.push_str(&format!(
            "lda_relay_submit_latency_ms{{quantile=\"0.5\"}} {}\n",
            latency.p50
        ));
        output.push_str(&format!(
            "lda_relay_submit_latency_ms{{quantile=\"0.9\"}} {}\n",
            latency.p90
        ));
        output.push_str(&format!(
            "lda_relay_submit_latency_ms{{quantile=\"0.99\"}} {}\n",
            latency.p99
        ));
        output.push_str(&format!(
            "lda_relay_submit_latency_ms_count {}\n",
            summary.submissions_ok + summary.submissions_failed
        ));
    }

    output
}
