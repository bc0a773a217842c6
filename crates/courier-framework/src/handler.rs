//! Handler traits and the `next` continuation.
//!
//! Two kinds of handlers live on the stack:
//!
//! - [`Middleware`] receives `(Request, Response, Next)`. Generic middleware
//!   and command handlers share this shape.
//! - [`ErrorMiddleware`] receives the active error first:
//!   `(BoxError, Request, Response, Next)`.
//!
//! Both are implemented for async closures and functions returning `()` or
//! `Result<(), E>`, and can be implemented by hand for configurable
//! middleware structs.
//!
//! # Continuation
//!
//! A handler decides what happens after it returns by consuming its [`Next`]:
//!
//! | Handler does                     | Engine does                            |
//! |----------------------------------|----------------------------------------|
//! | `next.run()`                     | advance to the next matching entry     |
//! | `next.fail(err)` or returns `Err` | enter error mode with `err`           |
//! | panics                           | enter error mode with [`HandlerPanicked`] |
//! | drops `next`                     | stop the run                           |
//!
//! A returned `Err` takes precedence over a `next.run()` made earlier.
//!
//! ```rust,ignore
//! async fn ping(_req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
//!     res.reply("pong").await?;
//!     Ok(())
//! }
//!
//! router.command("ping", ping)?;
//! ```
//!
//! [`HandlerPanicked`]: crate::error::HandlerPanicked

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use courier_core::{Request, Response};
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::BoxError;

/// What a handler future resolves to once normalized.
pub type HandlerResult = Result<(), BoxError>;

// ============================================================================
// Handler Output
// ============================================================================

/// Return types accepted from handler functions.
pub trait IntoHandlerResult {
    /// Normalizes the value.
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Next
// ============================================================================

#[derive(Debug)]
pub(crate) enum Signal {
    Continue,
    Fail(BoxError),
}

/// The continuation handed to every handler.
///
/// Consuming it with [`run`](Self::run) or [`fail`](Self::fail) decides how
/// the run proceeds once the handler returns. Dropping it stops the run.
pub struct Next {
    tx: oneshot::Sender<Signal>,
}

impl Next {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Signal>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Continues with the next matching entry.
    ///
    /// Inside an error handler this marks the error as handled and resumes
    /// the regular chain.
    pub fn run(self) {
        let _ = self.tx.send(Signal::Continue);
    }

    /// Enters error mode with `err`.
    ///
    /// Inside an error handler this replaces the active error and moves on
    /// to the next error handler.
    pub fn fail(self, err: impl Into<BoxError>) {
        let _ = self.tx.send(Signal::Fail(err.into()));
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("consumed", &self.tx.is_closed())
            .finish()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// A regular stack handler.
pub trait Middleware: Send + Sync + 'static {
    /// Handles one request.
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Out> Middleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoHandlerResult,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(req, res, next);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased middleware stored on the stack.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An error handler.
pub trait ErrorMiddleware: Send + Sync + 'static {
    /// Handles the active error for one request.
    fn call(
        &self,
        err: BoxError,
        req: Request,
        res: Response,
        next: Next,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Out> ErrorMiddleware for F
where
    F: Fn(BoxError, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoHandlerResult,
{
    fn call(
        &self,
        err: BoxError,
        req: Request,
        res: Response,
        next: Next,
    ) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(err, req, res, next);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased error handler stored on the stack.
pub type BoxedErrorMiddleware = Arc<dyn ErrorMiddleware>;

// ============================================================================
// Handler Lists
// ============================================================================

/// Several middleware registered in one call.
///
/// Each handler becomes its own stack entry, in order.
///
/// ```rust,ignore
/// router.middleware(Handlers::new().then(no_bots()).then(parser))?;
/// ```
#[derive(Clone, Default)]
pub struct Handlers {
    items: Vec<BoxedMiddleware>,
}

impl Handlers {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn then(mut self, handler: impl Middleware) -> Self {
        self.items.push(Arc::new(handler));
        self
    }

    /// Appends an already boxed handler.
    pub fn then_boxed(mut self, handler: BoxedMiddleware) -> Self {
        self.items.push(handler);
        self
    }

    /// Appends every handler of `other`.
    pub fn extend(mut self, other: Handlers) -> Self {
        self.items.extend(other.items);
        self
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("len", &self.items.len())
            .finish()
    }
}

/// Values accepted as the handler argument of a registration method.
pub trait IntoHandlers {
    /// Boxes the handlers.
    fn into_handlers(self) -> Vec<BoxedMiddleware>;
}

impl<M: Middleware> IntoHandlers for M {
    fn into_handlers(self) -> Vec<BoxedMiddleware> {
        vec![Arc::new(self)]
    }
}

impl IntoHandlers for Handlers {
    fn into_handlers(self) -> Vec<BoxedMiddleware> {
        self.items
    }
}

/// Several error handlers registered in one call.
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    items: Vec<BoxedErrorMiddleware>,
}

impl ErrorHandlers {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error handler.
    pub fn then(mut self, handler: impl ErrorMiddleware) -> Self {
        self.items.push(Arc::new(handler));
        self
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers")
            .field("len", &self.items.len())
            .finish()
    }
}

/// Values accepted as the handler argument of error registration.
pub trait IntoErrorHandlers {
    /// Boxes the handlers.
    fn into_error_handlers(self) -> Vec<BoxedErrorMiddleware>;
}

impl<M: ErrorMiddleware> IntoErrorHandlers for M {
    fn into_error_handlers(self) -> Vec<BoxedErrorMiddleware> {
        vec![Arc::new(self)]
    }
}

impl IntoErrorHandlers for ErrorHandlers {
    fn into_error_handlers(self) -> Vec<BoxedErrorMiddleware> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::test_util::MockMessage;
    use std::io;

    fn request() -> (Request, Response) {
        let trigger = MockMessage::new("hi").into_trigger();
        (Request::new(trigger.clone()), Response::new(&trigger))
    }

    #[tokio::test]
    async fn test_closure_middleware_signals_continue() {
        let handler = |_req: Request, _res: Response, next: Next| async move { next.run() };
        let (req, res) = request();
        let (next, rx) = Next::channel();

        Middleware::call(&handler, req, res, next).await.unwrap();
        assert!(matches!(rx.await, Ok(Signal::Continue)));
    }

    #[tokio::test]
    async fn test_result_output_is_normalized() {
        let handler = |_req: Request, _res: Response, _next: Next| async move {
            Err::<(), _>(io::Error::other("nope"))
        };
        let (req, res) = request();
        let (next, _rx) = Next::channel();

        let err = Middleware::call(&handler, req, res, next)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_dropped_next_closes_channel() {
        let handler = |_req: Request, _res: Response, _next: Next| async {};
        let (req, res) = request();
        let (next, rx) = Next::channel();

        Middleware::call(&handler, req, res, next).await.unwrap();
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_error_middleware_receives_error() {
        let handler = |err: BoxError, _req: Request, _res: Response, next: Next| async move {
            next.fail(format!("wrapped: {err}"));
        };
        let (req, res) = request();
        let (next, rx) = Next::channel();

        ErrorMiddleware::call(&handler, "inner".into(), req, res, next)
            .await
            .unwrap();
        match rx.await {
            Ok(Signal::Fail(err)) => assert_eq!(err.to_string(), "wrapped: inner"),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn test_handler_lists() {
        let noop = |_req: Request, _res: Response, next: Next| async move { next.run() };
        let handlers = Handlers::new().then(noop).then(noop);
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers.into_handlers().len(), 2);
        assert_eq!(noop.into_handlers().len(), 1);
        assert!(ErrorHandlers::new().is_empty());
    }
}
