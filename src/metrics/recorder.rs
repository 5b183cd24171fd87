//! Request-duration histogram backed by Prometheus.

use prometheus::{HistogramOpts, HistogramVec};

use super::error::MetricsError;
use super::registry::MetricsRegistry;

pub const HTTP_REQUEST_DURATION_NAME: &str = "http_request_duration_seconds";
pub const HTTP_REQUEST_DURATION_LABELS: [&str; 3] = ["method", "route", "code"];
pub const DEFAULT_DURATION_BUCKETS: [f64; 9] = [0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

/// Trait for recording HTTP request metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records how long a request took, from arrival until its response finished.
    fn record_request_duration(&self, method: &str, route: &str, code: &str, duration_secs: f64);
}

/// Handle on the `http_request_duration_seconds` histogram.
#[derive(Clone)]
pub struct HttpMetrics {
    request_duration_seconds: HistogramVec,
}

impl HttpMetrics {
    /// Creates the histogram and registers it with `registry`.
    pub fn register(registry: &mut MetricsRegistry, buckets: &[f64]) -> Result<Self, MetricsError> {
        validate_buckets(buckets)?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                HTTP_REQUEST_DURATION_NAME,
                "Duration of HTTP requests in seconds",
            )
            .buckets(buckets.to_vec()),
            &HTTP_REQUEST_DURATION_LABELS,
        )?;
        registry.register_metric(Box::new(request_duration_seconds.clone()))?;

        Ok(HttpMetrics {
            request_duration_seconds,
        })
    }
}

impl MetricsRecorder for HttpMetrics {
    fn record_request_duration(&self, method: &str, route: &str, code: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[method, route, code])
            .observe(duration_secs.max(0.0));
    }
}

fn validate_buckets(buckets: &[f64]) -> Result<(), MetricsError> {
    if buckets.is_empty() {
        return Err(MetricsError::InvalidBuckets("no buckets given".into()));
    }
    if let Some(bad) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidBuckets(format!(
            "bucket bound {bad} is not finite"
        )));
    }
    if let Some(pair) = buckets.windows(2).find(|w| w[0] >= w[1]) {
        return Err(MetricsError::InvalidBuckets(format!(
            "bucket bounds must be strictly increasing, got {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
