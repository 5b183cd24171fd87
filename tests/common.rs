#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use hello_metrics::config::ConfigV1;
use hello_metrics::routes::create_router;
use hello_metrics::state::AppState;
use tower::ServiceExt;

pub fn test_config() -> ConfigV1 {
    let mut config = ConfigV1::default();
    config.bind_address = "127.0.0.1:0".to_string();
    config
}

pub fn build_app(config: ConfigV1) -> Router {
    let state = AppState::from_config(Arc::new(config)).expect("metrics registry should build");
    create_router(state)
}

pub fn request(path: &str, method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

/// Sends `request` and reads the whole body, which completes its timing.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Response<()>, String) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("body should be readable");
    let text = String::from_utf8(bytes.to_vec()).expect("body should be UTF-8");
    (parts.status, Response::from_parts(parts, ()), text)
}

pub async fn scrape(app: &Router) -> String {
    let (status, _, body) = send(app, request("/metrics", Method::GET)).await;
    assert_eq!(status, StatusCode::OK);
    body
}

/// Sample lines (no comments) whose metric name is exactly `name`.
pub fn samples<'a>(exposition: &'a str, name: &str) -> Vec<&'a str> {
    exposition
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}

/// Finds the sample of `name` carrying every `label="value"` pair and parses its value.
pub fn sample_value(exposition: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    samples(exposition, name)
        .into_iter()
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{k}=\"{v}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
