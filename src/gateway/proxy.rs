use std::net::SocketAddr;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{SharedGateway, client_key};

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Failures surfaced by the gateway itself rather than an upstream.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No upstream prefix matches the path (404).
    #[error("Service not found")]
    NoRoute,
    /// Client exceeded its per-minute budget (429).
    #[error("Rate limit exceeded")]
    RateLimited,
    /// Request body could not be buffered (400).
    #[error("Invalid request body: {0}")]
    Body(String),
    /// Upstream unreachable or timed out (503).
    #[error("Service unavailable: {0}")]
    Upstream(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NoRoute => StatusCode::NOT_FOUND,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

fn client_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Route a request to its upstream by path prefix, after charging the
/// client's rate-limit window.
pub async fn forward(
    State(gateway): State<SharedGateway>,
    request: Request,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_owned();
    let upstream = gateway
        .upstream_for(&path)
        .ok_or(GatewayError::NoRoute)?
        .to_owned();

    let ip = client_ip(&request);
    match gateway.limiter.hit(client_key(&ip)).await {
        Ok(hits) if hits > gateway.limit_per_minute => {
            debug!(%ip, hits, "rate limit exceeded");
            return Err(GatewayError::RateLimited);
        }
        Ok(_) => {}
        Err(err) => warn!(%ip, error = %err, "rate limiter failed; letting the request through"),
    }

    let url = match request.uri().query() {
        Some(query) => format!("{upstream}{path}?{query}"),
        None => format!("{upstream}{path}"),
    };
    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| GatewayError::Body(err.to_string()))?;

    let upstream_response = gateway
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream_response.status();
    let mut response_headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
