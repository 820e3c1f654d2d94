//! In-memory discovery provider.
//!
//! Serves fixed endpoint lists, either from the `addresses` of configured
//! backends or set programmatically.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::BackendConfig;
use crate::discovery::{parse_address, DiscoveryError, DiscoveryProvider};
use crate::scheduler::Endpoint;

/// Fixed service → endpoints table.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    services: RwLock<HashMap<String, Vec<Endpoint>>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of every backend that lists fixed addresses.
    pub fn from_backends(backends: &[BackendConfig]) -> Self {
        let discovery = Self::new();
        for backend in backends.iter().filter(|b| !b.addresses.is_empty()) {
            let endpoints = backend
                .addresses
                .iter()
                .filter_map(|a| {
                    let parsed = parse_address(a);
                    if parsed.is_none() {
                        tracing::warn!(backend = %backend.name, address = %a, "Invalid backend address");
                    }
                    parsed
                })
                .collect();
            discovery.set(&backend.name, endpoints);
        }
        discovery
    }

    /// Replace the endpoints of `service`.
    pub fn set(&self, service: &str, endpoints: Vec<Endpoint>) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.insert(service.to_string(), endpoints);
    }

    /// Forget `service`; later lookups fail with `NotFound`.
    pub fn remove(&self, service: &str) {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        services.remove(service);
    }
}

#[async_trait]
impl DiscoveryProvider for StaticDiscovery {
    async fn endpoints(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        let services = self.services.read().unwrap_or_else(|e| e.into_inner());
        services
            .get(service)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(service.to_string()))
    }
}
