//! Prometheus metrics backend for the lock manager.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`lockable_core::MetricsBackend`] that exposes metrics in Prometheus format.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lockable_core::{LockManager, ManagerConfig};
//! use lockable_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let manager = LockManager::builder(ManagerConfig::default())
//!     .with_metrics(Arc::new(metrics.clone()))
//!     .build()?;
//!
//! // Expose /metrics endpoint (example with custom HTTP server)
//! // let metric_families = metrics.gather();
//! // let encoder = prometheus::TextEncoder::new();
//! // encoder.encode(&metric_families, &mut response_buffer)?;
//! # drop(manager);
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `lockable_requests_submitted_total{kind}` - Counter
//! - `lockable_requests_granted_total` - Counter
//! - `lockable_requests_cancelled_total{reason}` - Counter
//! - `lockable_releases_total{cause}` - Counter
//! - `lockable_wait_seconds` - Histogram
//! - `lockable_queue_depth` - Gauge
//!
//! ## HTTP Server
//! This crate does NOT provide HTTP server for `/metrics` endpoint.
//! Use [`PrometheusMetrics::encode_text`] or [`PrometheusMetrics::gather`] from your
//! application's existing HTTP framework.

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
