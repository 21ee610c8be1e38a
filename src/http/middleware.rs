//! Tap middleware for axum routers.
//!
//! Applies the same record assembly as `Interceptor::handle` to an async
//! service: the inner service's response stands in for the start-response
//! signal, and is returned to the client untouched.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::HOST, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::transaction::{CapturedResponse, Interceptor, RequestMeta, TransactionRecord};

/// State shared by every tapped request.
#[derive(Clone)]
pub struct TapState {
    pub interceptor: Interceptor,
    /// Port the server is bound to, when known.
    pub server_port: Option<u16>,
}

impl TapState {
    pub fn new(interceptor: Interceptor, server_port: Option<u16>) -> Self {
        Self {
            interceptor,
            server_port,
        }
    }
}

/// Put the tap in front of every route (and the fallback) of `router`.
pub fn tap<S>(router: Router<S>, state: TapState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, tap_middleware))
}

/// Middleware function publishing one transaction per request.
///
/// Sink writes block (file append under a mutex), so the publish runs on the
/// blocking pool. The response is held until the record is written, which
/// keeps records in request order for a single client.
pub async fn tap_middleware(
    State(state): State<TapState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let record = TransactionRecord::from_request(&request_meta(&request, state.server_port));

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed();

    let record = record.complete(captured_response(&response), elapsed);
    let interceptor = state.interceptor;
    if let Err(e) = tokio::task::spawn_blocking(move || interceptor.emit(record)).await {
        tracing::error!(error = %e, "Transaction publish task failed");
    }
    response
}

/// Request metadata from an axum request.
///
/// The peer comes from `ConnectInfo`, which is only present when the router
/// is served with `into_make_service_with_connect_info`.
pub fn request_meta(request: &Request<Body>, server_port: Option<u16>) -> RequestMeta {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RequestMeta {
        method: Some(request.method().as_str().to_string()),
        path: Some(request.uri().path().to_string()),
        port: server_port
            .or_else(|| request.uri().port_u16())
            .or_else(|| host_port(request)),
        client_port: peer.map(|addr| addr.port()),
        client_ip: peer.map(|addr| addr.ip().to_string()),
    }
}

fn host_port(request: &Request<Body>) -> Option<u16> {
    let host = request.headers().get(HOST)?.to_str().ok()?;
    let (_, port) = host.rsplit_once(':')?;
    port.parse().ok()
}

/// Status line and header list as the handler produced them.
pub fn captured_response(response: &Response) -> CapturedResponse {
    let status = response.status();
    let status_line = match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    };

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    CapturedResponse {
        status_line: Some(status_line),
        headers,
    }
}
