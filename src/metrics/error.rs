use std::string::FromUtf8Error;

use thiserror::Error;

/// Errors raised while building or serializing the metrics registry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("invalid label name '{0}'")]
    InvalidLabelName(String),

    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics exposition is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}
