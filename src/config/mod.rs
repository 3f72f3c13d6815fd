//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or ServerConfig::new(address, max_tries)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → Dispatcher / Server constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server is built; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DispatchConfig, LimitsConfig, ListenerConfig, LogFormat, LoggingConfig, ObservabilityConfig,
    ServerConfig, DEFAULT_MAX_MEMORY,
};
pub use validation::{validate_config, ValidationError};
