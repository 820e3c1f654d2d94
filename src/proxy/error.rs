//! Per-request gateway failures.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::SchedulerError;

/// Why a request could not be proxied.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches '{0}'")]
    NoRoute(String),

    #[error(transparent)]
    NoBackend(#[from] SchedulerError),

    #[error("invalid upstream address: {0}")]
    InvalidUpstream(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

impl GatewayError {
    /// Status sent to the client. Unmatched routes use the configured default instead.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoBackend(_)
            | GatewayError::InvalidUpstream(_)
            | GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}
