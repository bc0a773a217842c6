//! Configuration module for the Courier runtime.
//!
//! Layered loading (defaults, `courier.toml`, `COURIER_*` environment
//! variables, programmatic overrides) and validation of logging, default
//! middleware and rate limit settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BlacklistConfig, CommandsConfig, CourierConfig, LogFormat, LogOutput, LoggingConfig,
    RateLimitConfig,
};
pub use validation::validate_config;
