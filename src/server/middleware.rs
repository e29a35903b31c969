//! Request middleware: panic recovery, CORS, rate limiting, request timeout,
//! request-scoped logging. Gzip comes from `tower_http::compression`; the
//! SSE route is mounted outside the gzip and timeout layers (see
//! `server::router`).

use super::error::ApiError;
use super::ratelimit::RateLimiter;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client IP for rate limiting and logs: first `X-Forwarded-For` entry,
/// else `X-Real-IP`, else the socket address.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn remote_addr(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

// ── Rate limiting ────────────────────────────────────────────────

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(req.headers(), remote_addr(&req));
    if !limiter.allow(&ip) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    next.run(req).await
}

// ── CORS ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CorsSettings {
    development: bool,
    allowed_origins: HashSet<String>,
}

impl CorsSettings {
    pub fn new(development: bool, origins: &[String]) -> Self {
        Self {
            development,
            allowed_origins: origins.iter().cloned().collect(),
        }
    }
}

/// Development echoes any origin (`*` when absent); production echoes only
/// allow-listed origins. Preflight requests short-circuit with 204.
pub async fn cors(State(settings): State<Arc<CorsSettings>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let allow_origin = if settings.development {
        Some(origin.unwrap_or_else(|| "*".to_string()))
    } else {
        origin.filter(|o| settings.allowed_origins.contains(o))
    };

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if let Some(allow_origin) = allow_origin {
        if let Ok(value) = HeaderValue::from_str(&allow_origin) {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("86400"),
            );
            if allow_origin != "*" {
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
    }

    response
}

// ── Request timeout ──────────────────────────────────────────────

/// Bounds the time to produce a response head. A handler that has started
/// streaming its body is past this deadline's reach, which is what SSE (and
/// any other streaming response mounted outside this layer) relies on.
pub async fn request_timeout(State(timeout): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, "request timeout").into_response(),
    }
}

// ── Request logging ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RequestLogSettings {
    /// Paths logged at debug instead of info (health probes).
    quiet_paths: HashSet<String>,
}

impl RequestLogSettings {
    pub fn new(quiet_paths: &[&str]) -> Self {
        Self {
            quiet_paths: quiet_paths.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Generates or propagates `X-Request-ID`, echoes it on the response, and
/// logs completion with status and latency.
pub async fn request_log(
    State(settings): State<Arc<RequestLogSettings>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ip = client_ip(req.headers(), remote_addr(&req));

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if settings.quiet_paths.contains(&path) {
        debug!(
            request_id,
            method = %method,
            path,
            client_ip = ip,
            status,
            elapsed_ms,
            "request"
        );
    } else {
        info!(
            request_id,
            method = %method,
            path,
            client_ip = ip,
            status,
            elapsed_ms,
            "request"
        );
    }

    response
}

// ── Panic recovery ───────────────────────────────────────────────

/// Custom handler for `tower_http::catch_panic::CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!(panic = detail, "handler panicked");
    ApiError::Internal("internal server error".into()).into_response()
}
