//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Path prefix to backend mappings.
    pub routes: Vec<RouteConfig>,

    /// Response served when no route matches.
    pub default_response: DefaultResponse,

    /// Backends and how their instances are discovered.
    pub backends: Vec<BackendConfig>,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Service discovery settings.
    pub discovery: DiscoveryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Route configuration mapping a path prefix to a backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Path prefix to match. Stripped before forwarding.
    pub path_prefix: String,

    /// Backend name to forward to.
    pub backend: String,
}

/// Body and status returned for unmatched requests.
///
/// Overrides the built-in `400 - not found -` only when both the body is
/// non-empty and the status is non-zero; see [`DefaultResponse::effective`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultResponse {
    pub body: String,
    pub status_code: u16,
}

impl Default for DefaultResponse {
    fn default() -> Self {
        Self {
            body: "- not found -".to_string(),
            status_code: 400,
        }
    }
}

impl DefaultResponse {
    /// The response actually served: the built-in one unless both fields are set.
    pub fn effective(&self) -> DefaultResponse {
        if self.body.is_empty() || self.status_code == 0 {
            DefaultResponse::default()
        } else {
            self.clone()
        }
    }
}

/// Backend definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Logical service name referenced by routes.
    pub name: String,

    /// Container labels selecting the instances of this backend.
    #[serde(default)]
    pub match_labels: Vec<String>,

    /// Fixed instance addresses ("host:port"). Takes precedence over labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of `bind_address`, keeping its host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host,
            _ => "0.0.0.0",
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Service discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Path of the container engine API socket.
    pub socket_path: String,

    /// How often every known service is re-discovered, in milliseconds.
    pub refresh_interval_ms: u64,

    /// Deadline for a single discovery call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            socket_path: "/var/run/docker.sock".to_string(),
            refresh_interval_ms: 1000,
            timeout_ms: 2000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for an upstream to produce response headers, in seconds.
    pub upstream_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle pooled upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
            idle_secs: 90,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
