use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::{AdmissionController, resolve_client_id};

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

/// Rejects requests whose client has run out of tokens with a plain-text 429.
pub async fn rate_limit(
    State(limiter): State<Arc<AdmissionController>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let client = resolve_client_id(req.headers(), remote);

    match limiter.try_admit(&client) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            tracing::debug!("Rate limit exceeded for {}", client);
            too_many_requests(wait)
        }
    }
}

fn too_many_requests(wait: Duration) -> Response {
    let retry_after = wait.as_secs_f64().ceil().clamp(1.0, f64::from(u32::MAX)) as u64;
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        RATE_LIMIT_MESSAGE,
    )
        .into_response()
}
