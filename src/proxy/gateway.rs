//! Request proxying.
//!
//! # Responsibilities
//! - Match the request path to a service
//! - Ask the scheduler for an endpoint and the pool for a handle
//! - Rewrite and forward the request (method, headers, body preserved)
//! - Classify the response and record it before returning
//!
//! # Design Decisions
//! - Every failure becomes a response; nothing here can stop the process
//! - Failures always count as errors, whatever status they map to
//! - Hop-by-hop headers are stripped in both directions

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;

use crate::config::GatewayConfig;
use crate::observability::{metrics, Stats};
use crate::proxy::error::GatewayError;
use crate::proxy::pool::ConnectionPool;
use crate::routing::Router;
use crate::scheduler::Scheduler;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// How a finished request counts in the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    /// Informational responses are not counted.
    Unclassified,
}

impl Outcome {
    /// 200..=399 succeed, 400 and above fail.
    pub fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=399 => Outcome::Success,
            400.. => Outcome::Error,
            _ => Outcome::Unclassified,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Unclassified => "unclassified",
        }
    }
}

/// Path-routing reverse proxy over scheduled backends.
pub struct Proxy {
    router: Router,
    scheduler: Arc<Scheduler>,
    pool: ConnectionPool,
    stats: Arc<Stats>,
    default_status: StatusCode,
    default_body: String,
    upstream_timeout: Duration,
}

impl Proxy {
    pub fn new(config: &GatewayConfig, scheduler: Arc<Scheduler>, stats: Arc<Stats>) -> Self {
        let default_response = config.default_response.effective();
        let default_status =
            StatusCode::from_u16(default_response.status_code).unwrap_or(StatusCode::BAD_REQUEST);
        Self {
            router: Router::from_config(&config.routes),
            scheduler,
            pool: ConnectionPool::new(
                Duration::from_secs(config.timeouts.connect_secs),
                Duration::from_secs(config.timeouts.idle_secs),
            ),
            stats,
            default_status,
            default_body: default_response.body,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Proxy one request. Latency and outcome are recorded before returning.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (service, result) = match self.router.match_path(&path) {
            Some(route) => {
                let service = route.backend.to_string();
                let result = self.forward(&service, route.forward_path, request).await;
                (service, result)
            }
            None => ("none".to_string(), Err(GatewayError::NoRoute(path.clone()))),
        };

        let (response, outcome) = match result {
            Ok(response) => {
                let outcome = Outcome::classify(response.status());
                (response, outcome)
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    error = %e,
                    "Request not proxied"
                );
                (self.error_response(&e), Outcome::Error)
            }
        };

        match outcome {
            Outcome::Success => {
                self.stats.inc_success();
            }
            Outcome::Error => {
                self.stats.inc_error();
            }
            Outcome::Unclassified => {}
        }
        self.stats.record(start.elapsed());
        metrics::record_request(&service, outcome.label(), start);

        response
    }

    async fn forward(
        &self,
        service: &str,
        forward_path: String,
        request: Request<Body>,
    ) -> Result<Response, GatewayError> {
        let endpoint = self.scheduler.next_backend(service).await?;
        let upstream = self
            .pool
            .open(&endpoint)
            .map_err(|e| GatewayError::InvalidUpstream(format!("{}: {}", endpoint, e)))?;

        let (mut parts, body) = request.into_parts();
        let path_and_query = match parts.uri.query() {
            Some(query) => format!("{}?{}", forward_path, query),
            None => forward_path,
        };
        parts.uri = upstream
            .uri_for(&path_and_query)
            .map_err(|e| GatewayError::InvalidUpstream(e.to_string()))?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, peer);
        }

        tracing::debug!(
            service = %service,
            upstream = %upstream.address(),
            path = %path_and_query,
            "Forwarding request"
        );

        let request = Request::from_parts(parts, body);
        let response = match time::timeout(self.upstream_timeout, upstream.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(GatewayError::Upstream(format!("{}: {}", upstream.address(), e)));
            }
            Err(_) => return Err(GatewayError::UpstreamTimeout(self.upstream_timeout)),
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn error_response(&self, error: &GatewayError) -> Response {
        match error {
            GatewayError::NoRoute(_) => (self.default_status, self.default_body.clone()).into_response(),
            other => (other.status_code(), other.to_string()).into_response(),
        }
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: &SocketAddr) {
    let client = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client),
        None => client,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
