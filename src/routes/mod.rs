//! HTTP route definitions and handlers.
//!
//! Routes are grouped by concern: the greeting and metrics exposition.
//! Every route, and the 404 fallback, is wrapped by the request-duration
//! middleware.

mod greeting_routes;
mod metrics;

pub use greeting_routes::GREETING;

use crate::metrics::track_request_duration;
use crate::state::AppState;
use axum::{middleware, Router};

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router, installs the timing
/// middleware and attaches the application state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(greeting_routes::routes())
        .merge(metrics::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_request_duration,
        ))
        .with_state(state)
}
