//! Middleware components for the HTTP server

pub mod auth;
pub mod logging;
pub mod rate_limit;

pub use auth::token_auth_middleware;
pub use logging::with_request_tracing;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
