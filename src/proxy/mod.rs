//! Core HTTP request forwarding handler.
//!
//! [`forward_handler`] is the Axum fallback that receives every request
//! not answered locally. It enforces the body ceiling, rewrites headers
//! ([`headers`]), sends the request to the fixed [`upstream`], and streams
//! the response back. Upgrade handshakes hand the connection pair off to
//! [`upgrade::relay`].

pub mod headers;
pub mod upgrade;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::{Full, LengthLimitError};

use crate::config::model::Config;
use crate::config::template::RenderContext;
use crate::error::ForwarderError;
use crate::server::AppState;
use headers::RewriteRules;
use upstream::Upstream;

/// Immutable per-process forwarding plan, compiled from the config once.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub upstream: Upstream,
    pub rewrites: RewriteRules,
    pub max_body: usize,
    pub server_name: String,
}

impl ProxyRoute {
    pub fn from_config(config: &Config) -> Result<Self, ForwarderError> {
        Ok(Self {
            upstream: Upstream::from_route(&config.route)?,
            rewrites: RewriteRules::compile(&config.route.header_rewrites)?,
            max_body: config.route.max_body_bytes.as_usize(),
            server_name: config.server_name.clone(),
        })
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// 504 when the upstream connect timed out, 502 for any other failure.
fn gateway_status(err: &(dyn std::error::Error + 'static)) -> StatusCode {
    if is_timeout(err) {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    }
}

fn payload_too_large() -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        [(header::CONNECTION, HeaderValue::from_static("close"))],
        "request body exceeds the configured limit",
    )
        .into_response()
}

#[allow(clippy::too_many_lines)]
pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
) -> Response {
    let route = &state.route;
    let correlation_id = correlation_id(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if declared_length(req.headers()).is_some_and(|len| len > route.max_body as u64) {
        tracing::warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            limit = route.max_body,
            "declared body exceeds limit"
        );
        state.stats.rejected.fetch_add(1, Ordering::Relaxed);
        return payload_too_large();
    }

    let client_upgrade = headers::is_upgrade_request(req.headers())
        .then(|| hyper::upgrade::on(&mut req));

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, route.max_body).await {
        Ok(bytes) => bytes,
        Err(e) if is_length_limit(&e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                limit = route.max_body,
                "streamed body exceeds limit"
            );
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return payload_too_large();
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                error = %e,
                "failed to read request body"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let uri = match route.upstream.uri_for(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "failed to build upstream URI"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let ctx = RenderContext {
        headers: &parts.headers,
        uri: &parts.uri,
        remote_addr: addr.ip(),
        server_name: &route.server_name,
    };
    let forwarded_headers = route.rewrites.apply(&ctx);

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        client = %addr.ip(),
        upgrade = client_upgrade.is_some(),
        "request received"
    );

    let mut upstream_req = hyper::Request::new(Full::new(body));
    *upstream_req.method_mut() = parts.method;
    *upstream_req.uri_mut() = uri;
    *upstream_req.headers_mut() = forwarded_headers;

    let start = std::time::Instant::now();
    let mut response = match state.http_client.request(upstream_req).await {
        Ok(response) => response,
        Err(e) => {
            let status = gateway_status(&e);
            tracing::warn!(
                correlation_id = %correlation_id,
                upstream = %route.upstream,
                error = %e,
                status = status.as_u16(),
                "upstream request failed"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return status.into_response();
        }
    };

    let status = response.status();
    let switching = status == StatusCode::SWITCHING_PROTOCOLS;

    tracing::info!(
        correlation_id = %correlation_id,
        status = status.as_u16(),
        latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "upstream responded"
    );

    if switching {
        let Some(client_upgrade) = client_upgrade else {
            tracing::warn!(
                correlation_id = %correlation_id,
                "upstream switched protocols without an upgrade request"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        };
        let upstream_upgrade = hyper::upgrade::on(&mut response);
        state.stats.upgraded.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(upgrade::relay(
            client_upgrade,
            upstream_upgrade,
            correlation_id.clone(),
        ));
    }

    state.stats.forwarded.fetch_add(1, Ordering::Relaxed);

    let (mut resp_parts, resp_body) = response.into_parts();
    headers::strip_response_hop_by_hop(&mut resp_parts.headers, switching);
    Response::from_parts(resp_parts, Body::new(resp_body))
}
