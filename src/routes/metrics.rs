//! Metrics exposition endpoint.

use crate::state::AppState;
use crate::utils::HTTPError;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};

/// Creates the metrics route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Handler for the /metrics endpoint.
///
/// Returns all collected metrics in Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, HTTPError> {
    let metrics_text = state.registry.metrics().map_err(|e| {
        tracing::error!(error = %e, "failed to render metrics");
        HTTPError::internal("failed to render metrics")
    })?;

    Ok((
        StatusCode::OK,
        [(http::header::CONTENT_TYPE, state.registry.content_type())],
        metrics_text,
    ))
}
