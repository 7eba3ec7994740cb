use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: route, status.
pub const REQUESTS_TOTAL: &str = "aforo_requests_total";

/// Histogram: request latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "aforo_request_duration_seconds";

/// Counter: capacity checks answered without a record (fail-open branch).
pub const CHECKS_FAIL_OPEN_TOTAL: &str = "aforo_checks_fail_open_total";

/// Counter: reservations rejected at the ceiling.
pub const RESERVATIONS_REJECTED_TOTAL: &str = "aforo_reservations_rejected_total";

/// Counter: auth failures (missing/invalid token or insufficient role).
pub const AUTH_FAILURES_TOTAL: &str = "aforo_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: registered excursions.
pub const EXCURSIONS_ACTIVE: &str = "aforo_excursions_active";

/// Counter: capacity records created by bulk opens.
pub const BULK_DAYS_CREATED_TOTAL: &str = "aforo_bulk_days_created_total";

/// Counter: WAL compaction passes completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "aforo_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
