//! # Courier Framework
//!
//! The middleware stack, command matcher and dispatch engine.
//!
//! This layer provides:
//! - Route parsing with wildcard and kebab-case support ([`PatternPath`])
//! - The command-path matcher ([`resolve_command_path`], [`matches`])
//! - Handler traits for async closures and middleware structs
//!   ([`Middleware`], [`ErrorMiddleware`], [`Next`])
//! - The Express-style [`Router`] and its dispatch engine
//! - A set of built-in [`middleware`]
//!
//! ```rust,ignore
//! use courier_framework::prelude::*;
//!
//! let router = Router::new();
//! router
//!     .middleware(message_command_parser(Some("!")))?
//!     .command("ping", |_req: Request, res: Response, _next: Next| async move {
//!         res.reply("pong").await?;
//!         Ok::<_, BoxError>(())
//!     })?
//!     .error(|err: BoxError, _req: Request, res: Response, _next: Next| async move {
//!         res.reply(format!("something went wrong: {err}")).await?;
//!         Ok::<_, BoxError>(())
//!     })?;
//!
//! router.dispatch(trigger).await;
//! ```

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod middleware;
pub mod route;
pub mod router;
pub mod stack;

pub use dispatcher::{DispatchOutcome, DispatchState, dispatch};
pub use error::{BoxError, ConfigurationError, ConfigurationResult, HandlerPanicked, MiddlewareError};
pub use handler::{
    BoxedErrorMiddleware, BoxedMiddleware, ErrorHandlers, ErrorMiddleware, HandlerResult,
    Handlers, IntoErrorHandlers, IntoHandlerResult, IntoHandlers, Middleware, Next,
};
pub use matcher::{MatchMode, MatchOutcome, first_match, matches, resolve_command_path};
pub use route::{IntoRoutes, PatternPath, Segment, WILDCARD, to_kebab_case};
pub use router::Router;
pub use stack::{EntryKind, Stack, StackEntry};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{BoxError, ConfigurationError};
    pub use super::handler::{ErrorHandlers, Handlers, Next};
    pub use super::middleware::{
        BlacklistOptions, NoBotsOptions, NoDmsOptions, RateLimitBy, RateLimitOptions,
        RecommendedOptions, blacklist, logger, message_command_parser, no_bots, no_dms,
        rate_limit, recommended,
    };
    pub use super::router::Router;
    pub use courier_core::prelude::*;
}
