//! Request tracing.

use axum::{body::Body, http::Request, http::Response, Router};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use crate::config::LoggingConfig;

/// Wraps `router` in a `TraceLayer`. With `enable_log` off only 4xx/5xx
/// responses and failures are logged.
pub fn with_request_tracing<S>(router: Router<S>, config: &LoggingConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let enable_log = config.enable_log;

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            })
            .on_request(move |request: &Request<Body>, _span: &Span| {
                if enable_log {
                    tracing::info!("{} {}", request.method(), request.uri().path());
                }
            })
            .on_response(move |response: &Response<Body>, latency: Duration, _span: &Span| {
                let status = response.status();
                let latency_ms = latency.as_millis();

                if status.is_server_error() {
                    tracing::error!(status = status.as_u16(), latency_ms, "server error response");
                } else if status.is_client_error() {
                    tracing::warn!(status = status.as_u16(), latency_ms, "client error response");
                } else if enable_log {
                    tracing::info!(status = status.as_u16(), latency_ms, "request completed");
                }
            })
            .on_failure(
                |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                    tracing::error!(latency_ms = latency.as_millis(), error = %error, "request failed");
                },
            ),
    )
}
