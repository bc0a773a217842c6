//! # Courier Core
//!
//! Request and response abstractions for the Courier command router.
//!
//! This crate is the boundary between a chat platform and the dispatch
//! engine. It defines what the engine consumes and what handlers see:
//!
//! - **Platform contract**: the narrow trait objects a platform integration
//!   implements ([`MessageTrigger`], [`InteractionTrigger`]) and the
//!   [`Trigger`] sum type that tags them once at the boundary.
//! - **Request normalizer**: [`Request`], a uniform view over both trigger
//!   kinds with a mutable [`CommandPath`], [`Body`] and [`Metadata`].
//! - **Response adapter**: [`Response`], one reply API for both kinds.
//!
//! ```text
//! ┌──────────┐   Trigger   ┌─────────┐   Request/Response   ┌──────────┐
//! │ Platform │────────────▶│ Courier │─────────────────────▶│ Handlers │
//! └──────────┘             └─────────┘                      └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::{Request, Response, Trigger};
//!
//! let trigger: Trigger = platform_event.into();
//! let req = Request::new(trigger.clone());
//! let res = Response::new(&trigger);
//!
//! if req.is_interaction() {
//!     res.reply_ephemeral("pong").await?;
//! }
//! ```

pub mod body;
pub mod error;
pub mod platform;
pub mod request;
pub mod response;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use body::{Body, FlagValue, Metadata, ParsedArgs};
pub use error::{PlatformError, PlatformResult, ResponseError, ResponseResult};
pub use platform::{
    Channel, ChannelKind, CommandOption, EphemeralFallback, EphemeralOptions, Guild,
    InteractionOptions, InteractionTrigger, MessageOptions, MessageTrigger, SentMessage, Trigger,
    User,
};
pub use request::{CommandPath, MAX_DEPTH, Request, RequestType, interaction_command_path};
pub use response::Response;

/// Prelude for common imports.
pub mod prelude {
    pub use super::body::{Body, Metadata, ParsedArgs};
    pub use super::platform::{EphemeralFallback, EphemeralOptions, MessageOptions, Trigger};
    pub use super::request::{CommandPath, Request, RequestType};
    pub use super::response::Response;
}
