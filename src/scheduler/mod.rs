//! Backend scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → service name identified
//!     → selector.rs (Scheduler::next_backend)
//!         - no endpoint set yet? on-demand discovery lookup
//!         - queue.rs (pop next endpoint, refill when drained)
//!     → endpoint.rs (host, port, priority)
//!
//! Background:
//!     refresh tick → lookup every known service concurrently
//!     → replace full sets (queues pick them up on next refill)
//! ```
//!
//! # Design Decisions
//! - All priorities are zero today, so selection is round-robin
//! - Equal priorities drain in discovery order (deterministic)
//! - "No backend" is an explicit error, never a zero-valued endpoint

pub mod endpoint;
pub mod queue;
pub mod selector;

pub use endpoint::Endpoint;
pub use queue::SelectionQueue;
pub use selector::{Scheduler, SchedulerError};
