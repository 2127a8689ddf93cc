use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::error::AppError;
use crate::AppState;

pub const AUTH_QUERY_PARAM: &str = "auth";

/// Rejects requests that do not carry the shared token, either in the
/// `Authorization` header (raw or `Bearer`) or the `auth` query parameter.
/// The presented value is compared exactly; no whitespace is trimmed.
pub async fn token_auth_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = presented_token(&request);
    state.auth.authorize(addr.ip(), token.as_deref())?;
    Ok(next.run(request).await)
}

pub fn presented_token(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).to_string())
        .filter(|value| !value.is_empty());

    from_header.or_else(|| query_token(request.uri().query()))
}

fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == AUTH_QUERY_PARAM)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}
