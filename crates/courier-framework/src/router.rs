//! The registration surface.
//!
//! [`Router`] owns the middleware stack and exposes the Express-style
//! registration methods. Registration validates routes and handlers up
//! front and fails with a [`ConfigurationError`]; dispatch never fails.
//!
//! | Method                  | Entry kind            | Runs for                       |
//! |-------------------------|-----------------------|--------------------------------|
//! | `middleware`            | `use`                 | every request                  |
//! | `middleware_at`         | `use-routed`          | requests under a route prefix  |
//! | `command`               | `command`             | matching requests of any kind  |
//! | `message_command`       | `message-command`     | matching message requests      |
//! | `interaction_command`   | `interaction-command` | matching interaction requests  |
//! | `error` / `error_at`    | `error`               | failed runs                    |
//!
//! # Tower Service Integration
//!
//! `Router` implements `tower::Service<Trigger>`, so dispatch can be wrapped
//! with tower middleware:
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tower::ServiceBuilder;
//! use tower::timeout::TimeoutLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(5)))
//!     .service(router.clone());
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_core::{Request, Response, Trigger};
use futures::future::BoxFuture;
use tower::Service;
use tracing::debug;

use crate::dispatcher::{self, DispatchOutcome};
use crate::error::{ConfigurationError, ConfigurationResult};
use crate::handler::{IntoErrorHandlers, IntoHandlers};
use crate::route::{IntoRoutes, PatternPath};
use crate::stack::{EntryKind, Stack, StackEntry};

/// The middleware router.
///
/// Cloning is cheap; all clones share one stack.
#[derive(Clone, Default)]
pub struct Router {
    stack: Stack,
}

impl Router {
    /// Creates a router with an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying stack.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    fn register(
        &self,
        kind: EntryKind,
        patterns: Vec<PatternPath>,
        handlers: impl IntoHandlers,
    ) -> ConfigurationResult<&Self> {
        let handlers = handlers.into_handlers();
        if handlers.is_empty() {
            return Err(ConfigurationError::NoHandlers);
        }

        let patterns: Arc<[PatternPath]> = patterns.into();
        debug!(
            kind = %kind,
            routes = ?patterns.iter().map(ToString::to_string).collect::<Vec<_>>(),
            handlers = handlers.len(),
            "Registering stack entries"
        );
        self.stack.extend(
            handlers
                .into_iter()
                .map(|handler| StackEntry::regular(kind, Arc::clone(&patterns), handler)),
        );
        Ok(self)
    }

    /// Registers middleware that runs for every request.
    pub fn middleware(&self, handlers: impl IntoHandlers) -> ConfigurationResult<&Self> {
        self.register(EntryKind::Use, Vec::new(), handlers)
    }

    /// Registers middleware for requests under the given route prefixes.
    ///
    /// `"admin"` runs for `admin`, `admin/users`, `admin/users/ban` and so
    /// on. Positional arguments are left untouched.
    pub fn middleware_at(
        &self,
        routes: impl IntoRoutes,
        handlers: impl IntoHandlers,
    ) -> ConfigurationResult<&Self> {
        self.register(EntryKind::UseRouted, routes.into_routes()?, handlers)
    }

    /// Registers a command handler for any request type.
    pub fn command(
        &self,
        routes: impl IntoRoutes,
        handlers: impl IntoHandlers,
    ) -> ConfigurationResult<&Self> {
        self.register(EntryKind::Command, routes.into_routes()?, handlers)
    }

    /// Registers a command handler for message requests only.
    pub fn message_command(
        &self,
        routes: impl IntoRoutes,
        handlers: impl IntoHandlers,
    ) -> ConfigurationResult<&Self> {
        self.register(EntryKind::MessageCommand, routes.into_routes()?, handlers)
    }

    /// Registers a command handler for interaction requests only.
    pub fn interaction_command(
        &self,
        routes: impl IntoRoutes,
        handlers: impl IntoHandlers,
    ) -> ConfigurationResult<&Self> {
        self.register(EntryKind::InteractionCommand, routes.into_routes()?, handlers)
    }

    fn register_error(
        &self,
        patterns: Vec<PatternPath>,
        handlers: impl IntoErrorHandlers,
    ) -> ConfigurationResult<&Self> {
        let handlers = handlers.into_error_handlers();
        if handlers.is_empty() {
            return Err(ConfigurationError::NoHandlers);
        }

        let patterns: Arc<[PatternPath]> = patterns.into();
        debug!(
            routes = ?patterns.iter().map(ToString::to_string).collect::<Vec<_>>(),
            handlers = handlers.len(),
            "Registering error handlers"
        );
        self.stack.extend(
            handlers
                .into_iter()
                .map(|handler| StackEntry::error(Arc::clone(&patterns), handler)),
        );
        Ok(self)
    }

    /// Registers error handlers for every failed run.
    pub fn error(&self, handlers: impl IntoErrorHandlers) -> ConfigurationResult<&Self> {
        self.register_error(Vec::new(), handlers)
    }

    /// Registers error handlers for failed runs of the given routes.
    pub fn error_at(
        &self,
        routes: impl IntoRoutes,
        handlers: impl IntoErrorHandlers,
    ) -> ConfigurationResult<&Self> {
        self.register_error(routes.into_routes()?, handlers)
    }

    /// Builds the request and response for `trigger` and dispatches them.
    pub async fn dispatch(&self, trigger: Trigger) -> DispatchOutcome {
        let res = Response::new(&trigger);
        let req = Request::new(trigger);
        self.dispatch_request(req, res).await
    }

    /// Dispatches an already built request and response.
    pub async fn dispatch_request(&self, req: Request, res: Response) -> DispatchOutcome {
        dispatcher::dispatch(&self.stack, req, res).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("entries", &self.stack.len())
            .finish()
    }
}

// ============================================================================
// Tower Service Implementation for Router
// ============================================================================

impl Service<Trigger> for Router {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, trigger: Trigger) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(trigger).await) })
    }
}
