//! Runtime error types.

use courier_framework::ConfigurationError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// Middleware registration was rejected by the router.
    #[error("Router configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The trigger channel is closed.
    #[error("Trigger channel is closed")]
    ChannelClosed,

    /// The event pump was already started.
    #[error("Runtime is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
