//! Built-in middleware.
//!
//! Every item here is an ordinary [`Middleware`](crate::Middleware) value and
//! is registered like any other handler:
//!
//! ```rust,ignore
//! router
//!     .middleware(recommended(RecommendedOptions::default()))?
//!     .middleware(message_command_parser(Some("!")))?
//!     .middleware(logger("tiny"))?;
//! ```

pub mod guards;
pub mod logger;
pub mod parser;
pub mod rate_limit;
pub mod split;

pub use guards::{
    BlacklistOptions, NoBotsOptions, NoDmsOptions, RecommendedOptions, blacklist, no_bots, no_dms,
    recommended,
};
pub use logger::{ACCESS_TARGET, DateFormat, LogFormat, format_date, format_line, logger};
pub use parser::{
    MessageCommandParser, PREFIX_METADATA_KEY, ParsedCommand, message_command_parser, parse_args,
};
pub use rate_limit::{
    IncrementResponse, MaxHits, MemoryStore, RateLimit, RateLimitBy, RateLimitInfo,
    RateLimitOptions, RateLimitStore, rate_limit,
};
pub use split::shell_split;
