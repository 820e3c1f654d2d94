//! Upstream endpoint abstraction.
//!
//! # Responsibilities
//! - Represent one discovered instance of a service
//! - Carry the selection priority (lower is served sooner)
//! - Render the authority used to reach the instance

use std::fmt;
use std::hash::{Hash, Hasher};

/// A single upstream target. Identity is `(host, port)`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Host name or IP literal.
    pub host: String,
    /// Published port.
    pub port: u16,
    /// Selection priority. Lower values drain first.
    pub priority: u16,
    /// Relative weight. Not yet used for selection.
    pub weight: u16,
}

impl Endpoint {
    /// Create an endpoint with priority and weight zero.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            priority: 0,
            weight: 0,
        }
    }

    /// Set the selection priority.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Fully resolved upstream address, e.g. `http://10.0.0.4:32768`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.authority())
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}
