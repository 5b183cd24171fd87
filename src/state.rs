//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! configuration, the metrics registry and the request-duration histogram.

use crate::config::ConfigV1;
use crate::metrics::{HttpMetrics, MetricsRegistry};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler. The registry is frozen
/// once it is placed here; metric values change only through `http_metrics`
/// and the collectors registered at startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Registry serialized by `GET /metrics`.
    pub registry: Arc<MetricsRegistry>,
    /// Histogram fed by the request-duration middleware.
    pub http_metrics: HttpMetrics,
}

impl AppState {
    /// Builds the registry described by `config.metrics` and wraps it in state.
    ///
    /// # Errors
    ///
    /// Fails on invalid default labels or buckets, or if two metrics share a
    /// name.
    pub fn from_config(config: Arc<ConfigV1>) -> Result<Self, crate::metrics::MetricsError> {
        let metrics_config = &config.metrics;
        let mut registry = MetricsRegistry::new().with_eventloop_lag_interval(
            std::time::Duration::from_millis(metrics_config.eventloop_lag_interval_ms.max(1)),
        );
        registry.set_default_labels(metrics_config.default_labels.clone())?;
        if metrics_config.collect_default_metrics {
            registry.collect_default_metrics()?;
        }
        let http_metrics = HttpMetrics::register(&mut registry, &metrics_config.buckets)?;

        Ok(AppState {
            config,
            registry: Arc::new(registry),
            http_metrics,
        })
    }
}
