use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Key used when neither proxy headers nor the transport address are available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the admission key for a request.
///
/// Order: first non-empty entry of `X-Forwarded-For`, then `X-Real-IP`,
/// then the peer address of the connection.
pub fn resolve_client_id(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()));

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(ip) => ip.to_string(),
        None => remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
    }
}
