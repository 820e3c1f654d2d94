//! Configuration validation.
//!
//! Serde handles syntax; this checks semantics. Every problem is collected
//! so a broken file can be fixed in one pass. Problems that still leave a
//! usable gateway are returned separately by [`config_warnings`] so the
//! binary can log them once its subscriber is installed.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::discovery::parse_address;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("default_response.status_code {0} is not a valid HTTP status")]
    InvalidDefaultStatus(u16),

    #[error("backend '{0}' is defined more than once")]
    DuplicateBackend(String),

    #[error("backend '{0}' has neither match_labels nor addresses")]
    UndiscoverableBackend(String),

    #[error("backend '{backend}' has invalid address '{address}'")]
    InvalidAddress { backend: String, address: String },

    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("route prefix '{0}' is defined more than once")]
    DuplicatePrefix(String),

    #[error("discovery.refresh_interval_ms must be greater than zero")]
    ZeroRefreshInterval,

    #[error(
        "timeouts.request_secs ({request_secs}s) must exceed timeouts.upstream_secs \
         plus discovery.timeout_ms ({inner_ms}ms)"
    )]
    RequestTimeoutTooShort { request_secs: u64, inner_ms: u64 },
}

/// A configuration problem that does not stop the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("route '{path_prefix}' references backend '{backend}' with no discovery configuration")]
    UnknownBackend { path_prefix: String, backend: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Zero means "unset" and falls back to the built-in default response.
    let status = config.default_response.status_code;
    if status != 0 && !(100..=599).contains(&status) {
        errors.push(ValidationError::InvalidDefaultStatus(status));
    }

    let mut names = HashSet::new();
    for backend in &config.backends {
        if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.match_labels.is_empty() && backend.addresses.is_empty() {
            errors.push(ValidationError::UndiscoverableBackend(backend.name.clone()));
        }
        for address in &backend.addresses {
            if parse_address(address).is_none() {
                errors.push(ValidationError::InvalidAddress {
                    backend: backend.name.clone(),
                    address: address.clone(),
                });
            }
        }
    }

    let mut prefixes = HashSet::new();
    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(route.path_prefix.clone()));
        }
        if !prefixes.insert(route.path_prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix(route.path_prefix.clone()));
        }
    }

    if config.discovery.refresh_interval_ms == 0 {
        errors.push(ValidationError::ZeroRefreshInterval);
    }

    // The outer request deadline must never cut off a proxied request
    // before its own discovery and upstream deadlines have run out.
    let inner_ms = config
        .timeouts
        .upstream_secs
        .saturating_mul(1000)
        .saturating_add(config.discovery.timeout_ms);
    if config.timeouts.request_secs.saturating_mul(1000) <= inner_ms {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: config.timeouts.request_secs,
            inner_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Non-fatal problems in an otherwise valid configuration.
pub fn config_warnings(config: &GatewayConfig) -> Vec<ValidationWarning> {
    let names: HashSet<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
    config
        .routes
        .iter()
        .filter(|route| !names.contains(route.backend.as_str()))
        .map(|route| ValidationWarning::UnknownBackend {
            path_prefix: route.path_prefix.clone(),
            backend: route.backend.clone(),
        })
        .collect()
}
