//! Prometheus-compatible metrics endpoint for the Synapse server.
//!
//! Tracks request counts, terminal sessions and relayed calls. Per-node
//! counters live in each node's persisted stats instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide metrics registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total HTTP requests served.
    http_requests_total: AtomicU64,
    /// Total HTTP errors (4xx + 5xx).
    http_errors_total: AtomicU64,
    /// Terminal sessions opened over WebSocket.
    sessions_opened_total: AtomicU64,
    /// Terminal sessions currently attached.
    sessions_active: AtomicI64,
    /// Inbound relay executions.
    relay_executions_total: AtomicU64,
    /// Registry registrations through the API.
    registrations_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                sessions_opened_total: AtomicU64::new(0),
                sessions_active: AtomicI64::new(0),
                relay_executions_total: AtomicU64::new(0),
                registrations_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.inner
            .sessions_opened_total
            .fetch_add(1, Ordering::Relaxed);
        self.inner.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.inner.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_relay_executions(&self) {
        self.inner
            .relay_executions_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations(&self) {
        self.inner
            .registrations_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        format!(
            r#"# HELP synapse_uptime_seconds Time since the server started.
# TYPE synapse_uptime_seconds gauge
synapse_uptime_seconds {}

# HELP synapse_http_requests_total Total HTTP requests served.
# TYPE synapse_http_requests_total counter
synapse_http_requests_total {}

# HELP synapse_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE synapse_http_errors_total counter
synapse_http_errors_total {}

# HELP synapse_sessions_opened_total Terminal sessions opened.
# TYPE synapse_sessions_opened_total counter
synapse_sessions_opened_total {}

# HELP synapse_sessions_active Terminal sessions currently attached.
# TYPE synapse_sessions_active gauge
synapse_sessions_active {}

# HELP synapse_relay_executions_total Relayed requests executed by local nodes.
# TYPE synapse_relay_executions_total counter
synapse_relay_executions_total {}

# HELP synapse_registrations_total Registry registrations received.
# TYPE synapse_registrations_total counter
synapse_registrations_total {}
"#,
            self.uptime_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.sessions_opened_total.load(Ordering::Relaxed),
            m.sessions_active.load(Ordering::Relaxed),
            m.relay_executions_total.load(Ordering::Relaxed),
            m.registrations_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter_increments() {
        let m = Metrics::new();
        m.inc_http_requests();
        m.inc_http_requests();
        m.inc_relay_executions();
        let output = m.render_prometheus();
        assert!(output.contains("synapse_http_requests_total 2"));
        assert!(output.contains("synapse_relay_executions_total 1"));
    }

    #[test]
    fn test_active_sessions_gauge() {
        let m = Metrics::new();
        m.session_opened();
        m.session_opened();
        m.session_closed();
        let output = m.render_prometheus();
        assert!(output.contains("synapse_sessions_opened_total 2"));
        assert!(output.contains("synapse_sessions_active 1"));
    }

    #[test]
    fn test_metrics_prometheus_format() {
        let output = Metrics::new().render_prometheus();
        assert!(output.contains("# HELP synapse_uptime_seconds"));
        assert!(output.contains("# TYPE synapse_sessions_active gauge"));
        assert!(output.contains("# TYPE synapse_http_requests_total counter"));
    }
}
