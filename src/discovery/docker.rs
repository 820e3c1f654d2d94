//! Container engine discovery over a unix socket.
//!
//! # Responsibilities
//! - Map a service name to its configured label filter
//! - Query `GET /containers/json?filters={"label":[...]}` on the engine socket
//! - Turn every published port into an endpoint
//!
//! # Design Decisions
//! - One short-lived HTTP/1.1 connection per query; discovery is infrequent
//! - Deadlines are applied by the caller (the scheduler)
//! - Containers without published ports are skipped, not errors

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{header, Method, Request};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::BackendConfig;
use crate::discovery::{DiscoveryError, DiscoveryProvider};
use crate::scheduler::Endpoint;

/// Discovery client for the container engine API.
#[derive(Debug, Clone)]
pub struct DockerDiscovery {
    socket_path: PathBuf,
    /// Service name → label filters.
    labels: HashMap<String, Vec<String>>,
}

impl DockerDiscovery {
    pub fn new(socket_path: impl Into<PathBuf>, labels: HashMap<String, Vec<String>>) -> Self {
        Self {
            socket_path: socket_path.into(),
            labels,
        }
    }

    /// Label filters of every backend that declares some.
    pub fn from_backends(socket_path: &str, backends: &[BackendConfig]) -> Self {
        let labels = backends
            .iter()
            .filter(|b| !b.match_labels.is_empty())
            .map(|b| (b.name.clone(), b.match_labels.clone()))
            .collect();
        Self::new(socket_path, labels)
    }

    #[cfg(unix)]
    async fn get(&self, path_and_query: &str) -> Result<Bytes, DiscoveryError> {
        use hyper_util::rt::TokioIo;
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            DiscoveryError::Transport(format!("connect {}: {}", self.socket_path.display(), e))
        })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Discovery connection closed with error");
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(path_and_query)
            .header(header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(DiscoveryError::Transport(format!(
                "engine returned {}: {}",
                status,
                String::from_utf8_lossy(&body).trim()
            )));
        }
        Ok(body)
    }

    #[cfg(not(unix))]
    async fn get(&self, _path_and_query: &str) -> Result<Bytes, DiscoveryError> {
        Err(DiscoveryError::Transport(
            "unix sockets are not supported on this platform".into(),
        ))
    }
}

#[async_trait]
impl DiscoveryProvider for DockerDiscovery {
    async fn endpoints(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        let labels = self
            .labels
            .get(service)
            .ok_or_else(|| DiscoveryError::NotFound(service.to_string()))?;

        let body = self.get(&containers_query(labels)).await?;
        let endpoints = parse_containers(&body)?;

        tracing::debug!(service = %service, count = endpoints.len(), "Containers discovered");
        Ok(endpoints)
    }
}

/// Origin-form request target listing containers carrying all `labels`.
pub fn containers_query(labels: &[String]) -> String {
    let filters = serde_json::json!({ "label": labels }).to_string();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("filters", &filters)
        .finish();
    format!("/containers/json?{}", query)
}

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Ports", default)]
    ports: Option<Vec<PortBinding>>,
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "IP", default)]
    ip: Option<String>,
    #[serde(rename = "PublicPort", default)]
    public_port: Option<u16>,
}

/// Decode a `/containers/json` body into endpoints, one per published port.
pub fn parse_containers(body: &[u8]) -> Result<Vec<Endpoint>, DiscoveryError> {
    let containers: Vec<ContainerSummary> = serde_json::from_slice(body)
        .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;

    let endpoints = containers
        .into_iter()
        .flat_map(|c| c.ports.unwrap_or_default())
        .filter_map(|binding| match binding.public_port {
            Some(port) if port > 0 => Some(Endpoint::new(reachable_host(binding.ip), port)),
            _ => None,
        })
        .collect();
    Ok(endpoints)
}

/// Wildcard bind addresses are reachable through loopback.
fn reachable_host(ip: Option<String>) -> String {
    match ip.as_deref() {
        None | Some("") | Some("0.0.0.0") => "127.0.0.1".to_string(),
        Some("::") => "::1".to_string(),
        Some(other) => other.to_string(),
    }
}
