//! Courier Runtime - configuration, logging and the event pump.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `CourierConfig`)
//! - `tracing-subscriber` setup driven by that configuration
//! - The `CourierRuntime` pump that turns platform triggers into dispatch runs
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = CourierRuntime::builder().with_defaults().build()?;
//!     runtime.router().command("ping", ping)?;
//!
//!     let sender = runtime.sender()?;
//!     gateway::connect(sender);
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    CommandsConfig, ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig,
    RateLimitConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError};
pub use runtime::{CourierRuntime, RuntimeBuilder, TriggerSender, install_defaults};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use super::{CourierConfig, CourierRuntime, TriggerSender};
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
