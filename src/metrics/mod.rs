//! Metrics collection and exposition for Prometheus.
//!
//! This module owns the process-wide metrics registry, the default
//! process/runtime collectors and the request-duration middleware.

mod error;
mod middleware;
mod recorder;
mod registry;
mod runtime;

pub use error::MetricsError;
pub use middleware::{track_request_duration, RequestTimer, TimedBody};
pub use recorder::{
    HttpMetrics, MetricsRecorder, DEFAULT_DURATION_BUCKETS, HTTP_REQUEST_DURATION_LABELS,
    HTTP_REQUEST_DURATION_NAME,
};
pub use registry::MetricsRegistry;
pub use runtime::{LagSampler, RuntimeCollector};
