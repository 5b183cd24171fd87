//! Request-duration middleware.
//!
//! A [`RequestTimer`] is started when a request enters the router and travels
//! with the response inside a [`TimedBody`]. The observation is made exactly
//! once: when the body reaches end-of-stream, or when it is dropped because
//! the connection went away mid-transfer. Requests cancelled before the
//! handler produced a response are not observed.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use http_body::{Body as _, Frame, SizeHint};

use super::recorder::MetricsRecorder;
use crate::state::AppState;

/// Axum middleware feeding `http_request_duration_seconds`.
///
/// Install with `axum::middleware::from_fn_with_state`.
pub async fn track_request_duration(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let timer = RequestTimer::start(state.http_metrics.clone(), &request);
    let response = next.run(request).await;
    let status = response.status();
    response.map(|body| Body::new(TimedBody::new(body, timer, status)))
}

/// Start time and labels of one in-flight request.
pub struct RequestTimer<R: MetricsRecorder> {
    recorder: R,
    method: String,
    route: String,
    started: Instant,
}

impl<R: MetricsRecorder> RequestTimer<R> {
    /// Captures the method and route of `request` and starts the clock.
    ///
    /// The route is the matched pattern (e.g. `/users/:id`); unmatched
    /// requests fall back to the raw path.
    pub fn start<B>(recorder: R, request: &http::Request<B>) -> Self {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        RequestTimer {
            recorder,
            method: request.method().to_string(),
            route,
            started: Instant::now(),
        }
    }

    pub fn finish(self, status: StatusCode) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let code = status.as_u16().to_string();
        self.recorder
            .record_request_duration(&self.method, &self.route, &code, elapsed);

        tracing::debug!(
            method = %self.method,
            route = %self.route,
            code = %code,
            elapsed_secs = elapsed,
            "request completed"
        );
    }
}

/// Response body that finishes its [`RequestTimer`] when done.
pub struct TimedBody<R: MetricsRecorder> {
    inner: Body,
    pending: Option<(RequestTimer<R>, StatusCode)>,
}

impl<R: MetricsRecorder> TimedBody<R> {
    pub fn new(inner: Body, timer: RequestTimer<R>, status: StatusCode) -> Self {
        TimedBody {
            inner,
            pending: Some((timer, status)),
        }
    }

    fn complete(&mut self) {
        if let Some((timer, status)) = self.pending.take() {
            timer.finish(status);
        }
    }
}

impl<R: MetricsRecorder + Unpin> http_body::Body for TimedBody<R> {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.complete();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<R: MetricsRecorder> Drop for TimedBody<R> {
    fn drop(&mut self) {
        self.complete();
    }
}
