//! Fixed-window request throttling per client address.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Routes that move file bodies are not counted.
const EXEMPT_SUFFIXES: [&str; 3] = ["/files/stream", "/files/download", "/files/upload-file"];

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, RateWindow>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window_seconds)
    }

    pub fn check(&self, ip: IpAddr) -> Result<u32, RateLimitError> {
        self.check_at(ip, Instant::now())
    }

    /// Counts one request from `ip` and returns how many remain in the window.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<u32, RateLimitError> {
        let mut windows = self.windows.lock();
        let window = windows.entry(ip).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(window.window_start) >= self.window {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= self.max_requests {
            let reset_in = self
                .window
                .saturating_sub(now.duration_since(window.window_start));
            return Err(RateLimitError {
                retry_after_seconds: reset_in.as_secs().max(1),
                limit: self.max_requests,
            });
        }

        window.count += 1;
        Ok(self.max_requests - window.count)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

pub fn is_exempt(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    EXEMPT_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after_seconds: u64,
    pub limit: u32,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": "Too many requests, please try again later.",
            "code": "RATE_LIMITED",
            "status": StatusCode::TOO_MANY_REQUESTS.as_u16(),
            "retry_after": self.retry_after_seconds,
        }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        let headers = response.headers_mut();
        headers.insert("Retry-After", HeaderValue::from(self.retry_after_seconds));
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
        response
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let remaining = limiter.check(addr.ip()).map_err(|err| {
        tracing::warn!(client_ip = %addr.ip(), retry_after = err.retry_after_seconds, "rate limit exceeded");
        err
    })?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limiter.limit()));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    Ok(response)
}
