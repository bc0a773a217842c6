//! Guard middleware.
//!
//! A guard either continues the chain or halts it silently by dropping its
//! `next`; it never replies and never fails.

use std::collections::HashSet;
use std::sync::Arc;

use courier_core::{Request, Response};
use tracing::debug;

use crate::handler::{Handlers, Middleware, Next};

fn guard<F>(name: &'static str, reject: F) -> impl Middleware + Clone
where
    F: Fn(&Request) -> bool + Send + Sync + 'static,
{
    let reject = Arc::new(reject);
    move |req: Request, _res: Response, next: Next| {
        if reject(&req) {
            debug!(guard = name, user_id = %req.user().id, "Request rejected by guard");
        } else {
            next.run();
        }
        std::future::ready(())
    }
}

/// Options for [`no_bots`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBotsOptions {
    /// Let messages posted by webhooks through.
    pub allow_webhooks: bool,
}

/// Halts requests from bot accounts and, unless allowed, webhooks.
pub fn no_bots(options: NoBotsOptions) -> impl Middleware + Clone {
    guard("no_bots", move |req| {
        let webhook = req
            .message()
            .is_some_and(|message| message.webhook_id().is_some());
        req.user().bot || (!options.allow_webhooks && webhook)
    })
}

/// Options for [`no_dms`].
#[derive(Debug, Clone, Default)]
pub struct NoDmsOptions {
    /// Users allowed to use the bot from direct messages.
    pub allowed_users: Vec<String>,
}

/// Halts direct-message requests from users not on the allow list.
pub fn no_dms(options: NoDmsOptions) -> impl Middleware + Clone {
    let allowed: HashSet<String> = options.allowed_users.into_iter().collect();
    guard("no_dms", move |req| {
        req.is_dm() && !allowed.contains(&req.user().id)
    })
}

/// Options for [`recommended`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendedOptions {
    /// Skip the bot guard.
    pub allow_bots: bool,
    /// Skip the direct-message guard.
    pub allow_dms: bool,
}

/// The guards every bot should run: [`no_bots`] and [`no_dms`] unless
/// allowed.
///
/// The list is empty when both are allowed.
pub fn recommended(options: RecommendedOptions) -> Handlers {
    let mut handlers = Handlers::new();
    if !options.allow_bots {
        handlers = handlers.then(no_bots(NoBotsOptions::default()));
    }
    if !options.allow_dms {
        handlers = handlers.then(no_dms(NoDmsOptions::default()));
    }
    handlers
}

/// Options for [`blacklist`].
#[derive(Debug, Clone, Default)]
pub struct BlacklistOptions {
    /// Blocked guild ids.
    pub guilds: Vec<String>,
    /// Blocked user ids.
    pub users: Vec<String>,
}

/// Halts requests from listed guilds or users.
pub fn blacklist(options: BlacklistOptions) -> impl Middleware + Clone {
    let guilds: HashSet<String> = options.guilds.into_iter().collect();
    let users: HashSet<String> = options.users.into_iter().collect();
    guard("blacklist", move |req| {
        req.guild_id().is_some_and(|id| guilds.contains(id)) || users.contains(&req.user().id)
    })
}
