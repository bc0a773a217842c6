//! Fixed-window rate limiting.
//!
//! Every request increments a hit counter for a key derived from the request
//! (user, channel, guild, a combination, or a custom function). The current
//! state is written to the request metadata so later handlers can show it:
//!
//! ```json
//! { "limit": 5, "current": 2, "remaining": 3, "resetTime": "2024-01-01T00:01:00Z" }
//! ```
//!
//! Once the counter exceeds the limit the chain stops. The custom limit
//! handler runs if one is configured; otherwise the requester gets a private
//! reply with the configured message.
//!
//! ```rust,ignore
//! router.middleware(rate_limit(
//!     RateLimitOptions::new()
//!         .by(RateLimitBy::GuildUser)
//!         .window(Duration::from_secs(30))
//!         .max(3),
//! ))?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::{EphemeralFallback, EphemeralOptions, MessageOptions, Request, Response};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MiddlewareError;
use crate::handler::{BoxedMiddleware, HandlerResult, Middleware, Next};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default number of requests allowed per window.
pub const DEFAULT_MAX: u64 = 5;
/// Default reply sent to limited requesters.
pub const DEFAULT_MESSAGE: &str = "You are being rate limited";
/// Default metadata key.
pub const DEFAULT_META_PROPERTY: &str = "rateLimit";

// ============================================================================
// Store
// ============================================================================

/// Result of incrementing a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementResponse {
    /// Hits recorded for the key in the current window.
    pub total_hits: u64,
    /// When the counter resets.
    pub reset_time: Option<DateTime<Utc>>,
}

/// A hit counter backend.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    /// Records a hit for `key`.
    async fn increment(&self, key: &str) -> Result<IncrementResponse, MiddlewareError>;

    /// Removes one hit from `key`.
    async fn decrement(&self, key: &str) -> Result<(), MiddlewareError>;

    /// Clears the counter for `key`.
    async fn reset_key(&self, key: &str) -> Result<(), MiddlewareError>;

    /// Clears every counter.
    async fn reset_all(&self) -> Result<(), MiddlewareError>;
}

#[derive(Debug)]
struct MemoryState {
    hits: HashMap<String, u64>,
    reset_time: DateTime<Utc>,
}

/// In-process store.
///
/// All counters reset together once the window has elapsed; the reset is
/// applied lazily on the next access.
#[derive(Debug)]
pub struct MemoryStore {
    window: chrono::Duration,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates a store with the given window length.
    pub fn new(window: Duration) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self {
            window,
            state: Mutex::new(MemoryState {
                hits: HashMap::new(),
                reset_time: next_reset(Utc::now(), window),
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock();
        let now = Utc::now();
        if now >= state.reset_time {
            state.hits.clear();
            state.reset_time = next_reset(now, self.window);
        }
        f(&mut state)
    }

    /// Current hit count for `key`.
    pub fn hits(&self, key: &str) -> u64 {
        self.with_state(|state| state.hits.get(key).copied().unwrap_or(0))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn next_reset(now: DateTime<Utc>, window: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<IncrementResponse, MiddlewareError> {
        Ok(self.with_state(|state| {
            let hits = state.hits.entry(key.to_string()).or_insert(0);
            *hits += 1;
            IncrementResponse {
                total_hits: *hits,
                reset_time: Some(state.reset_time),
            }
        }))
    }

    async fn decrement(&self, key: &str) -> Result<(), MiddlewareError> {
        self.with_state(|state| {
            if let Some(hits) = state.hits.get_mut(key) {
                *hits = hits.saturating_sub(1);
            }
        });
        Ok(())
    }

    async fn reset_key(&self, key: &str) -> Result<(), MiddlewareError> {
        self.with_state(|state| {
            state.hits.remove(key);
        });
        Ok(())
    }

    async fn reset_all(&self) -> Result<(), MiddlewareError> {
        let mut state = self.state.lock();
        state.hits.clear();
        state.reset_time = next_reset(Utc::now(), self.window);
        Ok(())
    }
}

// ============================================================================
// Options
// ============================================================================

/// What a counter is keyed by.
#[derive(Clone, Default)]
pub enum RateLimitBy {
    /// The requesting user.
    #[default]
    User,
    /// The channel; DMs without a channel fall back to `noChannel-{user}`.
    Channel,
    /// The guild; DMs fall back to `noGuild-{user}`.
    Guild,
    /// Guild and user together.
    GuildUser,
    /// Channel and user together.
    ChannelUser,
    /// A custom key function.
    Custom(Arc<dyn Fn(&Request) -> String + Send + Sync>),
}

impl RateLimitBy {
    /// Derives the counter key for `req`.
    pub fn key(&self, req: &Request) -> String {
        let user = &req.user().id;
        match self {
            Self::User => user.clone(),
            Self::Channel => req
                .channel_id()
                .map_or_else(|| format!("noChannel-{user}"), str::to_string),
            Self::Guild => req
                .guild_id()
                .map_or_else(|| format!("noGuild-{user}"), str::to_string),
            Self::GuildUser => match req.guild_id() {
                Some(guild) => format!("{guild}-{user}"),
                None => format!("noGuild-{user}"),
            },
            Self::ChannelUser => match req.channel_id() {
                Some(channel) => format!("{channel}-{user}"),
                None => format!("noChannel-{user}"),
            },
            Self::Custom(f) => f(req),
        }
    }

    /// Parses a built-in method name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Self::User),
            "channel" => Some(Self::Channel),
            "guild" => Some(Self::Guild),
            "guildUser" | "guild_user" => Some(Self::GuildUser),
            "channelUser" | "channel_user" => Some(Self::ChannelUser),
            _ => None,
        }
    }
}

impl fmt::Debug for RateLimitBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("User"),
            Self::Channel => f.write_str("Channel"),
            Self::Guild => f.write_str("Guild"),
            Self::GuildUser => f.write_str("GuildUser"),
            Self::ChannelUser => f.write_str("ChannelUser"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The request limit per window.
#[derive(Clone)]
pub enum MaxHits {
    /// The same limit for everyone.
    Fixed(u64),
    /// A limit computed per request.
    Dynamic(Arc<dyn Fn(&Request) -> u64 + Send + Sync>),
}

impl MaxHits {
    fn resolve(&self, req: &Request) -> u64 {
        match self {
            Self::Fixed(max) => *max,
            Self::Dynamic(f) => f(req),
        }
    }
}

impl From<u64> for MaxHits {
    fn from(max: u64) -> Self {
        Self::Fixed(max)
    }
}

/// Predicate deciding that a request bypasses the limiter.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Configuration for [`rate_limit`].
#[derive(Clone)]
pub struct RateLimitOptions {
    by: RateLimitBy,
    window: Duration,
    max: MaxHits,
    message: String,
    meta_property_name: String,
    handler: Option<BoxedMiddleware>,
    skip: Option<SkipFn>,
    store: Option<Arc<dyn RateLimitStore>>,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            by: RateLimitBy::default(),
            window: DEFAULT_WINDOW,
            max: MaxHits::Fixed(DEFAULT_MAX),
            message: DEFAULT_MESSAGE.to_string(),
            meta_property_name: DEFAULT_META_PROPERTY.to_string(),
            handler: None,
            skip: None,
            store: None,
        }
    }
}

impl RateLimitOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the counter key.
    pub fn by(mut self, by: RateLimitBy) -> Self {
        self.by = by;
        self
    }

    /// Keys counters with a custom function.
    pub fn by_key(self, f: impl Fn(&Request) -> String + Send + Sync + 'static) -> Self {
        self.by(RateLimitBy::Custom(Arc::new(f)))
    }

    /// Sets the window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets a fixed limit.
    pub fn max(mut self, max: u64) -> Self {
        self.max = MaxHits::Fixed(max);
        self
    }

    /// Computes the limit per request.
    pub fn max_with(mut self, f: impl Fn(&Request) -> u64 + Send + Sync + 'static) -> Self {
        self.max = MaxHits::Dynamic(Arc::new(f));
        self
    }

    /// Sets the reply sent to limited requesters.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the metadata key the state is written to.
    pub fn meta_property_name(mut self, name: impl Into<String>) -> Self {
        self.meta_property_name = name.into();
        self
    }

    /// Replaces the default reply with a handler.
    ///
    /// The handler receives the request's `next` and may continue the chain.
    pub fn handler(mut self, handler: impl Middleware) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Lets matching requests bypass the limiter.
    pub fn skip(mut self, f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.skip = Some(Arc::new(f));
        self
    }

    /// Uses a custom store instead of a [`MemoryStore`].
    pub fn store(mut self, store: impl RateLimitStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }
}

impl fmt::Debug for RateLimitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitOptions")
            .field("by", &self.by)
            .field("window", &self.window)
            .field("message", &self.message)
            .field("meta_property_name", &self.meta_property_name)
            .field("has_handler", &self.handler.is_some())
            .field("has_skip", &self.skip.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Rate-limit state written to the request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests seen in the current window, this one included.
    pub current: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub reset_time: Option<DateTime<Utc>>,
}

struct RateLimitInner {
    by: RateLimitBy,
    max: MaxHits,
    message: String,
    meta_property_name: String,
    handler: Option<BoxedMiddleware>,
    skip: Option<SkipFn>,
    store: Arc<dyn RateLimitStore>,
}

/// The rate-limit middleware.
#[derive(Clone)]
pub struct RateLimit {
    inner: Arc<RateLimitInner>,
}

/// Creates a rate limiter.
pub fn rate_limit(options: RateLimitOptions) -> RateLimit {
    let store = options
        .store
        .unwrap_or_else(|| Arc::new(MemoryStore::new(options.window)) as Arc<dyn RateLimitStore>);
    RateLimit {
        inner: Arc::new(RateLimitInner {
            by: options.by,
            max: options.max,
            message: options.message,
            meta_property_name: options.meta_property_name,
            handler: options.handler,
            skip: options.skip,
            store,
        }),
    }
}

impl RateLimit {
    /// The backing store.
    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.inner.store
    }
}

impl RateLimitInner {
    async fn handle(&self, req: Request, res: Response, next: Next) -> HandlerResult {
        if self.skip.as_ref().is_some_and(|skip| skip(&req)) {
            next.run();
            return Ok(());
        }

        let key = self.by.key(&req);
        let IncrementResponse {
            total_hits,
            reset_time,
        } = self.store.increment(&key).await?;
        let limit = self.max.resolve(&req);

        let info = RateLimitInfo {
            limit,
            current: total_hits,
            remaining: limit.saturating_sub(total_hits),
            reset_time,
        };
        req.metadata()
            .insert_serialized(self.meta_property_name.as_str(), &info)?;

        if total_hits <= limit {
            next.run();
            return Ok(());
        }

        debug!(key = %key, hits = total_hits, limit, "Rate limit exceeded");
        match &self.handler {
            Some(handler) => handler.call(req, res, next).await,
            None => {
                let reply = EphemeralOptions::from(MessageOptions::text(self.message.as_str()))
                    .fallback(EphemeralFallback::Normal);
                res.reply_ephemeral(reply).await?;
                Ok(())
            }
        }
    }
}

impl Middleware for RateLimit {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<'static, HandlerResult> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.handle(req, res, next).await })
    }
}

impl fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimit")
            .field("by", &self.inner.by)
            .field("meta_property_name", &self.inner.meta_property_name)
            .finish_non_exhaustive()
    }
}
