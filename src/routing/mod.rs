//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (prefix match + strip)
//!     → Return: RouteMatch (backend, forward path) or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Sort by prefix length (longest first, stable)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{Route, RouteMatch, Router};
