//! Proxying subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → gateway.rs (route match → Scheduler::next_backend)
//!     → pool.rs (handle for http://host:port, created once)
//!     → forward, classify, record in Stats
//!     → Response (upstream's, configured default, or 502/504)
//! ```

pub mod error;
pub mod gateway;
pub mod pool;

pub use error::GatewayError;
pub use gateway::{Outcome, Proxy};
pub use pool::{ConnectionPool, UpstreamHandle};
