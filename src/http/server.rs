//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router: `/stats` plus the proxy fallback
//! - Wire up middleware (timeout, request ID, access log)
//! - Run the discovery refresh loop alongside the listener
//! - Stop both on shutdown

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::GatewayConfig;
use crate::discovery::DiscoveryProvider;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::observability::Stats;
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;

/// HTTP front end of the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    proxy: Arc<Proxy>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, discovery: Arc<dyn DiscoveryProvider>) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            discovery,
            Duration::from_millis(config.discovery.timeout_ms),
        ));
        let stats = Arc::new(Stats::new());
        let proxy = Arc::new(Proxy::new(&config, scheduler, stats));

        let router = Self::build_router(&config, proxy.clone());
        Self {
            router,
            config,
            proxy,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, proxy: Arc<Proxy>) -> Router {
        Router::new()
            .route("/stats", get(stats_handler))
            .fallback(proxy_handler)
            .with_state(proxy)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(trace_layer())
            .layer(set_request_id_layer())
    }

    /// Router for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.proxy.stats().clone()
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.proxy.scheduler().clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        let refresh = self.proxy.scheduler().spawn_refresh(
            Duration::from_millis(self.config.discovery.refresh_interval_ms),
            shutdown.resubscribe(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        refresh.abort();
        let _ = refresh.await;

        tracing::info!("HTTP server stopped");
        result
    }
}

async fn stats_handler(State(proxy): State<Arc<Proxy>>) -> impl IntoResponse {
    Json(proxy.stats().snapshot())
}

async fn proxy_handler(State(proxy): State<Arc<Proxy>>, request: Request<Body>) -> Response {
    proxy.handle(request).await
}
