//! Axum middleware applying the rate limiter to routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::client_ip::client_key;
use super::limiter::RateLimiter;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// State for [`rate_limit`], installed with
/// `axum::middleware::from_fn_with_state`.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trust_forwarded_headers: bool,
}

/// Rejects requests over the limit with `429 Too Many Requests`.
///
/// The peer address comes from `ConnectInfo<SocketAddr>` when the server
/// was started with connect info; otherwise only forwarded headers (or the
/// `unknown` key) are available.
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let peer_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer_addr, state.trust_forwarded_headers);
    let limit = limit_header(&state.limiter);

    if !state.limiter.allow(&key) {
        warn!(client_ip = %key, path = %request.uri().path(), "Rate limit exceeded");
        return too_many_requests(limit);
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_RATELIMIT_LIMIT, limit);
    response
}

fn limit_header(limiter: &RateLimiter) -> HeaderValue {
    HeaderValue::from_str(&limiter.requests_per_second().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}

fn too_many_requests(limit: HeaderValue) -> Response {
    let reset = chrono::Utc::now().timestamp() + 1;

    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, limit);
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
    headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from_static("1"));

    (
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        "Rate limit exceeded, retry later\n",
    )
        .into_response()
}
