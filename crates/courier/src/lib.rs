//! # Courier
//!
//! An Express-style middleware router for chat bot events.
//!
//! ## Overview
//!
//! Text messages and slash-command interactions are normalized into one
//! [`Request`](core::Request) / [`Response`](core::Response) pair and run
//! through an ordered stack of handlers. Each handler decides whether the run
//! continues by consuming its `next` continuation.
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌──────────────────────────────────────┐
//! │   Platform   │────▶│ Runtime  │────▶│ Router: guards → parser → commands   │
//! │ (gateway)    │     │  (pump)  │     │         ↘ error handlers            │
//! └──────────────┘     └──────────┘     └──────────────────────────────────────┘
//! ```
//!
//! - **Core**: request normalization and the response adapter
//! - **Framework**: route patterns, the command matcher, the stack and the
//!   dispatch engine, plus built-in middleware
//! - **Runtime**: configuration, logging and the trigger pump
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn ping(_req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
//!     res.reply("pong").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let runtime = CourierRuntime::builder().with_defaults().build()?;
//!     runtime.router().command("ping", ping)?;
//!
//!     let sender = runtime.sender()?;
//!     gateway::connect(sender);
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `test-util`: in-memory triggers for tests

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierConfig, CourierRuntime, TriggerSender};

    // Router, handlers and built-in middleware
    pub use courier_framework::prelude::*;
    pub use courier_framework::{DispatchOutcome, DispatchState};
}
