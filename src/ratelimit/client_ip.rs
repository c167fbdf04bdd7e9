//! Deriving the rate-limit key for a request.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Key used when no source yields an address.
pub const UNKNOWN_CLIENT: &str = "unknown";

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse::<IpAddr>().ok()
}

/// First parseable address in `X-Forwarded-For`, else a parseable
/// `X-Real-IP`.
pub fn forwarded_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_xff = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').find_map(parse_ip));
    if from_xff.is_some() {
        return from_xff;
    }

    headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_ip)
}

/// Client key: forwarded headers (when trusted), then the peer address
/// without its port, then [`UNKNOWN_CLIENT`].
pub fn client_key(
    headers: &HeaderMap,
    peer_addr: Option<SocketAddr>,
    trust_forwarded_headers: bool,
) -> String {
    if trust_forwarded_headers && let Some(ip) = forwarded_client_ip(headers) {
        return ip.to_string();
    }

    peer_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
