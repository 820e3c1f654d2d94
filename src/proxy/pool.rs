//! Upstream connection pool.
//!
//! # Responsibilities
//! - Cache one forwarding handle per resolved upstream address
//! - Create handles lazily, exactly once per address
//!
//! # Design Decisions
//! - Keyed by `http://host:port`; entries live for the process lifetime
//! - Each handle owns a keep-alive client bound to its address
//! - Guarded by a sharded map, never by the scheduler lock

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, Scheme};
use axum::http::{Request, Response, Uri};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::scheduler::Endpoint;

/// Reusable forwarding handle for one upstream address.
#[derive(Debug)]
pub struct UpstreamHandle {
    address: String,
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl UpstreamHandle {
    fn new(endpoint: &Endpoint, connect_timeout: Duration, idle_timeout: Duration) -> Result<Self, InvalidUri> {
        let authority: Authority = endpoint.authority().parse()?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle_timeout)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Ok(Self {
            address: endpoint.base_url(),
            authority,
            client,
        })
    }

    /// Pool key, e.g. `http://10.0.0.4:32768`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Absolute URI on this upstream for an origin-form target.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }

    /// Send a request whose URI already points at this upstream.
    pub async fn send(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        self.client.request(request).await
    }
}

/// Address → handle cache.
#[derive(Debug)]
pub struct ConnectionPool {
    handles: DashMap<String, Arc<UpstreamHandle>>,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(connect_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            handles: DashMap::new(),
            connect_timeout,
            idle_timeout,
        }
    }

    /// Handle for `endpoint`, created on first use.
    ///
    /// Lookup and insertion happen under the same shard lock, so concurrent
    /// callers for one address always share a single handle.
    pub fn open(&self, endpoint: &Endpoint) -> Result<Arc<UpstreamHandle>, InvalidUri> {
        let key = endpoint.base_url();
        if let Some(handle) = self.handles.get(&key) {
            return Ok(Arc::clone(handle.value()));
        }

        let handle = match self.handles.entry(key) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(UpstreamHandle::new(
                    endpoint,
                    self.connect_timeout,
                    self.idle_timeout,
                )?);
                entry.insert(Arc::clone(&handle));
                handle
            }
        };

        tracing::debug!(upstream = %handle.address(), "Upstream handle created");
        metrics::record_upstream_handles(self.handles.len());
        Ok(handle)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ConnectionPool {
        ConnectionPool::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_same_address_shares_handle() {
        let pool = pool();
        let a = pool.open(&Endpoint::new("127.0.0.1", 8080)).unwrap();
        let b = pool.open(&Endpoint::new("127.0.0.1", 8080).with_priority(4)).unwrap();
        let c = pool.open(&Endpoint::new("127.0.0.1", 8081)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.address(), "http://127.0.0.1:8080");
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_creates_one_handle() {
        let pool = Arc::new(pool());
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                pool.open(&Endpoint::new("10.0.0.9", 9000)).unwrap()
            }));
        }

        let mut handles = Vec::new();
        for t in tasks {
            handles.push(t.await.unwrap());
        }
        assert_eq!(pool.len(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[test]
    fn test_uri_for() {
        let handle = UpstreamHandle::new(
            &Endpoint::new("::1", 9000),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let uri = handle.uri_for("/x?y=1").unwrap();
        assert_eq!(uri.to_string(), "http://[::1]:9000/x?y=1");
    }

    #[test]
    fn test_invalid_host_rejected() {
        let pool = pool();
        assert!(pool.open(&Endpoint::new("bad host", 80)).is_err());
        assert!(pool.is_empty());
    }
}
