//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every proxied request:
//!     → stats.rs (success/error counters, latency histogram) → GET /stats
//!     → metrics.rs (Prometheus counters and histograms, when enabled)
//!     → logging.rs (structured events, access span per request)
//! ```
//!
//! # Design Decisions
//! - Stats are lock-free and bounded in memory
//! - Metrics calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
pub mod stats;

pub use logging::init_logging;
pub use stats::{LatencyHistogram, Stats, StatsSnapshot};
