//! The event pump.
//!
//! Platform integrations push [`Trigger`]s through a [`TriggerSender`]; the
//! runtime spawns one dispatch run per trigger on its router and never waits
//! for one run before starting the next.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("config/courier.toml")
//!     .build()?;
//! runtime.install_defaults()?;
//! runtime.router().command("ping", ping)?;
//!
//! let sender = runtime.sender()?;
//! spawn_gateway(sender);
//!
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::time::Duration;

use courier_core::Trigger;
use courier_framework::Router;
use courier_framework::middleware::{
    BlacklistOptions, NoBotsOptions, NoDmsOptions, RateLimitBy, RateLimitOptions, blacklist,
    logger, message_command_parser, no_bots, no_dms, rate_limit,
};
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigError, ConfigLoader, CourierConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

// =============================================================================
// TriggerSender
// =============================================================================

/// Hands platform events to a running [`CourierRuntime`].
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl TriggerSender {
    /// Queues `trigger` for dispatch.
    pub fn send(&self, trigger: Trigger) -> RuntimeResult<()> {
        self.tx
            .send(trigger)
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Returns `true` once the runtime stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// CourierRuntime
// =============================================================================

/// Owns a router and the trigger channel feeding it.
///
/// ```rust,ignore
/// let runtime = CourierRuntime::from_config(&load_config()?);
/// let sender = runtime.sender()?;
/// runtime.run_until(shutdown_signal).await?;
/// ```
pub struct CourierRuntime {
    config: CourierConfig,
    router: Router,
    tx: Mutex<Option<mpsc::UnboundedSender<Trigger>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Trigger>>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl CourierRuntime {
    /// Creates a runtime with configuration loaded from the current directory.
    ///
    /// Falls back to the defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                CourierConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging from it.
    pub fn from_config(config: &CourierConfig) -> Self {
        if let Err(e) = logging::init_from_config(&config.logging) {
            eprintln!("Warning: Failed to initialize logging ({e})");
        }

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Self::with_router(config.clone(), Router::new())
    }

    /// Creates a runtime around an existing router. Logging is left alone.
    pub fn with_router(config: CourierConfig, router: Router) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            router,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Returns the router. Registrations are visible to the next dispatch.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registers the middleware described by the `commands` and `rate_limit`
    /// configuration sections.
    pub fn install_defaults(&self) -> RuntimeResult<&Self> {
        install_defaults(&self.router, &self.config)?;
        Ok(self)
    }

    /// Returns a sender for platform triggers.
    ///
    /// Senders must be taken before the pump starts; afterwards this fails
    /// with [`RuntimeError::ChannelClosed`].
    pub fn sender(&self) -> RuntimeResult<TriggerSender> {
        self.tx
            .lock()
            .as_ref()
            .map(|tx| TriggerSender { tx: tx.clone() })
            .ok_or(RuntimeError::ChannelClosed)
    }

    /// Returns a token that stops the pump when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests a shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Runs the pump until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Courier runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_signal()).await
    }

    /// Runs the pump until `shutdown` resolves, [`shutdown`](Self::shutdown)
    /// is called, or every [`TriggerSender`] is dropped.
    ///
    /// Dispatch runs still in flight are awaited before returning.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut rx = self.rx.lock().take().ok_or(RuntimeError::AlreadyRunning)?;
        // Only external senders keep the channel open from here on.
        self.tx.lock().take();

        debug!(entries = self.router.len(), "Trigger pump started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                trigger = rx.recv() => match trigger {
                    Some(trigger) => self.spawn_dispatch(trigger),
                    None => {
                        info!("All trigger senders dropped");
                        break;
                    }
                },
            }
        }

        rx.close();
        self.tracker.close();
        self.tracker.wait().await;

        info!("Runtime stopped");
        Ok(())
    }

    fn spawn_dispatch(&self, trigger: Trigger) {
        trace!(trigger = ?trigger, "Trigger received");
        let router = self.router.clone();
        self.tracker.spawn(async move {
            router.dispatch(trigger).await;
        });
    }
}

impl Default for CourierRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("router", &self.router)
            .field("running", &self.rx.lock().is_none())
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// If no signal handler can be installed this never resolves and the pump
/// stops only through its token or its senders.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Default Middleware
// =============================================================================

/// Registers the middleware described by `config` on `router`.
///
/// In order: the bot and DM guards (unless allowed), the blacklist, the
/// message command parser, the rate limit and the access logger. The rate
/// limit and the logger are mounted on `*`, so they only see requests that
/// carry a command.
pub fn install_defaults(router: &Router, config: &CourierConfig) -> RuntimeResult<()> {
    let commands = &config.commands;

    if !commands.allow_bots {
        router.middleware(no_bots(NoBotsOptions {
            allow_webhooks: commands.allow_webhooks,
        }))?;
    }
    if !commands.allow_dms {
        router.middleware(no_dms(NoDmsOptions::default()))?;
    }
    if !commands.blacklist.is_empty() {
        router.middleware(blacklist(BlacklistOptions {
            guilds: commands.blacklist.guilds.clone(),
            users: commands.blacklist.users.clone(),
        }))?;
    }

    router.middleware(message_command_parser(commands.prefix.as_deref()))?;

    if let Some(limits) = &config.rate_limit {
        let by = RateLimitBy::from_name(&limits.rate_limit_by).ok_or_else(|| {
            ConfigError::validation(format!(
                "Invalid rate limit method: {}",
                limits.rate_limit_by
            ))
        })?;
        let options = RateLimitOptions::new()
            .by(by)
            .window(Duration::from_millis(limits.window_ms))
            .max(limits.max)
            .message(limits.message.as_str())
            .meta_property_name(limits.meta_property_name.as_str());
        router.middleware_at("*", rate_limit(options))?;
    }

    if let Some(format) = &commands.access_log {
        router.middleware_at("*", logger(format.as_str()))?;
    }

    debug!(entries = router.len(), "Default middleware installed");
    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `CourierRuntime` with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = CourierRuntime::builder()
///     .config_file("config/courier.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    router: Option<Router>,
    install_defaults: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            router: None,
            install_defaults: false,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses an existing router instead of an empty one.
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Registers the configured default middleware on build.
    pub fn with_defaults(mut self) -> Self {
        self.install_defaults = true;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        logging::init_from_config(&config.logging)?;

        let runtime = CourierRuntime::with_router(config, self.router.unwrap_or_default());
        if self.install_defaults {
            runtime.install_defaults()?;
        }
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use courier_core::test_util::{MockMessage, PlatformCall};
    use courier_core::{MessageOptions, Request, Response};
    use courier_framework::Next;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    fn counting_router(counter: &Arc<AtomicUsize>) -> Router {
        let router = Router::new();
        let counter = Arc::clone(counter);
        router
            .middleware(move |_req: Request, _res: Response, next: Next| {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run();
                async {}
            })
            .unwrap();
        router
    }

    fn pong(_req: Request, res: Response, _next: Next) -> impl Future<Output = ()> + Send {
        async move {
            res.reply("pong").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_pump_dispatches_until_senders_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let runtime = CourierRuntime::with_router(CourierConfig::default(), counting_router(&counter));

        let sender = runtime.sender().unwrap();
        for content in ["one", "two", "three"] {
            sender.send(MockMessage::new(content).into_trigger()).unwrap();
        }
        drop(sender);

        timeout(
            Duration::from_secs(5),
            runtime.run_until(std::future::pending()),
        )
        .await
        .expect("pump should stop once senders are gone")
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_pump() {
        let runtime = CourierRuntime::with_router(CourierConfig::default(), Router::new());
        let sender = runtime.sender().unwrap();

        let (result, ()) = tokio::join!(runtime.run_until(std::future::pending()), async {
            tokio::task::yield_now().await;
            runtime.shutdown();
        });
        result.unwrap();
        assert!(sender.is_closed());
        assert!(matches!(
            sender.send(MockMessage::new("late").into_trigger()),
            Err(RuntimeError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_pump_runs_once() {
        let runtime = CourierRuntime::with_router(CourierConfig::default(), Router::new());
        runtime.run_until(async {}).await.unwrap();

        assert!(matches!(
            runtime.run_until(async {}).await,
            Err(RuntimeError::AlreadyRunning)
        ));
        assert!(matches!(runtime.sender(), Err(RuntimeError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_install_defaults_guards_and_parses() {
        let mut config = CourierConfig::default();
        config.commands.prefix = Some("!".to_string());
        let runtime = CourierRuntime::with_router(config, Router::new());
        runtime.install_defaults().unwrap();
        runtime.router().command("ping", pong).unwrap();

        let message = MockMessage::new("!ping");
        let calls = message.calls();
        runtime.router().dispatch(message.into_trigger()).await;
        assert_eq!(
            *calls.lock(),
            vec![PlatformCall::Reply {
                options: MessageOptions::text("pong"),
                ephemeral: false,
            }]
        );

        let from_bot = MockMessage::new("!ping").from_bot();
        let calls = from_bot.calls();
        runtime.router().dispatch(from_bot.into_trigger()).await;
        assert!(calls.lock().is_empty());

        let in_dm = MockMessage::new("!ping").in_dm();
        let calls = in_dm.calls();
        runtime.router().dispatch(in_dm.into_trigger()).await;
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_install_defaults_rate_limits_commands_only() {
        let config = CourierConfig {
            rate_limit: Some(RateLimitConfig {
                max: 1,
                ..Default::default()
            }),
            ..Default::default()
        };
        let runtime = CourierRuntime::with_router(config, Router::new());
        runtime.install_defaults().unwrap();
        runtime.router().command("ping", pong).unwrap();

        // Plain chatter is never parsed, so it does not count.
        runtime
            .router()
            .dispatch(MockMessage::new("hello there").into_trigger())
            .await;

        let first = MockMessage::new("<@bot-1> ping");
        let first_calls = first.calls();
        runtime.router().dispatch(first.into_trigger()).await;
        assert_eq!(first_calls.lock().len(), 1);

        let second = MockMessage::new("<@bot-1> ping");
        let second_calls = second.calls();
        runtime.router().dispatch(second.into_trigger()).await;
        assert_eq!(
            *second_calls.lock(),
            vec![PlatformCall::Reply {
                options: MessageOptions::text("You are being rate limited"),
                ephemeral: false,
            }]
        );
    }

    #[test]
    fn test_install_defaults_entry_count() {
        let router = Router::new();
        install_defaults(&router, &CourierConfig::default()).unwrap();
        // no_bots, no_dms, parser
        assert_eq!(router.len(), 3);

        let mut config = CourierConfig::default();
        config.commands.allow_bots = true;
        config.commands.allow_dms = true;
        config.commands.blacklist.users = vec!["user-9".to_string()];
        config.commands.access_log = Some("tiny".to_string());
        let router = Router::new();
        install_defaults(&router, &config).unwrap();
        // blacklist, parser, logger
        assert_eq!(router.len(), 3);
    }
}
