use std::time::Duration;

use lockable_core::MetricsBackend;
use lockable_model::ReleaseCause;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, proto::MetricFamily,
};
use thiserror::Error;

const WAIT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0,
];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Prometheus-backed [`MetricsBackend`].
///
/// Cloning is cheap; clones share the same collectors and registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    submitted: IntCounterVec,
    granted: IntCounter,
    cancelled: IntCounterVec,
    released: IntCounterVec,
    wait: Histogram,
    queue_depth: IntGauge,
}

impl PrometheusMetrics {
    /// Collectors registered in a fresh private registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Collectors registered in the given registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let submitted = IntCounterVec::new(
            Opts::new(
                "lockable_requests_submitted_total",
                "Lock requests submitted, by target kind",
            ),
            &["kind"],
        )?;
        let granted = IntCounter::new(
            "lockable_requests_granted_total",
            "Lock requests granted",
        )?;
        let cancelled = IntCounterVec::new(
            Opts::new(
                "lockable_requests_cancelled_total",
                "Lock requests cancelled before grant, by reason",
            ),
            &["reason"],
        )?;
        let released = IntCounterVec::new(
            Opts::new(
                "lockable_releases_total",
                "Granted requests whose resources went back to the pool, by cause",
            ),
            &["cause"],
        )?;
        let wait = Histogram::with_opts(
            HistogramOpts::new(
                "lockable_wait_seconds",
                "Time between submission and grant",
            )
            .buckets(WAIT_BUCKETS.to_vec()),
        )?;
        let queue_depth = IntGauge::new("lockable_queue_depth", "Requests waiting in the queue")?;

        registry.register(Box::new(submitted.clone()))?;
        registry.register(Box::new(granted.clone()))?;
        registry.register(Box::new(cancelled.clone()))?;
        registry.register(Box::new(released.clone()))?;
        registry.register(Box::new(wait.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            submitted,
            granted,
            cancelled,
            released,
            wait,
            queue_depth,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Current metrics in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_submitted(&self, kind: &'static str) {
        self.submitted.with_label_values(&[kind]).inc();
    }

    fn record_granted(&self, waited: Duration) {
        self.granted.inc();
        self.wait.observe(waited.as_secs_f64());
    }

    fn record_released(&self, cause: ReleaseCause) {
        self.released.with_label_values(&[cause.as_str()]).inc();
    }

    fn record_cancelled(&self, cause: ReleaseCause) {
        self.cancelled.with_label_values(&[cause.as_str()]).inc();
    }

    fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}
