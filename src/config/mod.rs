//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes live for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use validation::{config_warnings, validate_config, ValidationError, ValidationWarning};
pub use schema::{
    BackendConfig, DefaultResponse, DiscoveryConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, RouteConfig, TimeoutConfig,
};
