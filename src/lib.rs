//! HTTP API gateway.
//!
//! Routes requests by path prefix to services whose instances are found
//! through container discovery, picks an instance per request from a
//! per-service priority queue, and keeps success/error counts and latency
//! percentiles for `GET /stats`.

pub mod config;
pub mod discovery;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod scheduler;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
