//! The root greeting.

use crate::state::AppState;
use axum::{response::IntoResponse, routing::get, Router};

pub const GREETING: &str = "Hello World from Node.js!";

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(greeting))
}

async fn greeting() -> impl IntoResponse {
    GREETING
}
