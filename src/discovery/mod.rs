//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (on-demand lookup or refresh tick)
//!     → DiscoveryProvider::endpoints(service)
//!         - static_list.rs (addresses from config)
//!         - docker.rs (containers matching the backend's labels)
//!     → Vec<Endpoint> or DiscoveryError
//! ```
//!
//! # Design Decisions
//! - Providers are stateless from the scheduler's point of view
//! - An empty list is a valid answer (service known, nothing running)
//! - Unknown services are an error, not an empty list

pub mod docker;
pub mod static_list;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::scheduler::Endpoint;

pub use docker::DockerDiscovery;
pub use static_list::StaticDiscovery;

/// Errors that can occur while resolving a service.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// No discovery rule exists for the service.
    #[error("service '{0}' not found")]
    NotFound(String),

    /// The data source could not be reached or refused the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The data source did not answer in time.
    #[error("discovery timed out after {0:?}")]
    Timeout(Duration),

    /// The data source answered with something we could not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Source of live endpoints for a logical service.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Return the current endpoints of `service`.
    async fn endpoints(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError>;
}

/// Tries `primary` first and falls through to `fallback` on `NotFound`.
pub struct ChainedDiscovery {
    primary: Arc<dyn DiscoveryProvider>,
    fallback: Arc<dyn DiscoveryProvider>,
}

impl ChainedDiscovery {
    pub fn new(primary: Arc<dyn DiscoveryProvider>, fallback: Arc<dyn DiscoveryProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl DiscoveryProvider for ChainedDiscovery {
    async fn endpoints(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        match self.primary.endpoints(service).await {
            Err(DiscoveryError::NotFound(_)) => self.fallback.endpoints(service).await,
            other => other,
        }
    }
}

/// Build the provider described by the `backends` section.
///
/// Backends with fixed addresses are served statically; the rest are
/// resolved through the container engine socket using their labels.
pub fn from_config(config: &GatewayConfig) -> Arc<dyn DiscoveryProvider> {
    let fixed = StaticDiscovery::from_backends(&config.backends);
    let docker = DockerDiscovery::from_backends(
        &config.discovery.socket_path,
        &config.backends,
    );
    Arc::new(ChainedDiscovery::new(Arc::new(fixed), Arc::new(docker)))
}

/// Parse `host:port` (IPv6 hosts in brackets) into an endpoint.
pub fn parse_address(address: &str) -> Option<Endpoint> {
    let (host, port) = address.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(Endpoint::new(host, port))
}
