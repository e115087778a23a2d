use std::net::SocketAddr;

// ── Cache metrics ───────────────────────────────────────────────

/// Counter: reads served from a fresh snapshot.
pub const CACHE_HITS_TOTAL: &str = "volly_cache_hits_total";

/// Counter: reads that found no fresh snapshot.
pub const CACHE_MISSES_TOTAL: &str = "volly_cache_misses_total";

/// Counter: store loads started by the cache. Labels: status.
pub const CACHE_RELOADS_TOTAL: &str = "volly_cache_reloads_total";

/// Histogram: store load duration in seconds.
pub const CACHE_RELOAD_DURATION_SECONDS: &str = "volly_cache_reload_duration_seconds";

/// Counter: explicit invalidations.
pub const CACHE_INVALIDATIONS_TOTAL: &str = "volly_cache_invalidations_total";

/// Gauge: opportunities in the published snapshot.
pub const CATALOG_SIZE: &str = "volly_catalog_size";

// ── Query metrics ───────────────────────────────────────────────

/// Counter: catalog operations. Labels: operation, status.
pub const QUERIES_TOTAL: &str = "volly_queries_total";

/// Histogram: catalog operation latency in seconds. Labels: operation.
pub const QUERY_DURATION_SECONDS: &str = "volly_query_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus metrics exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record one catalog operation.
pub fn record_query(operation: &'static str, ok: bool, started: std::time::Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(QUERIES_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(QUERY_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
