//! The dispatch engine.
//!
//! One trigger starts one run. The engine walks the [`Stack`] with an
//! explicit cursor, one entry at a time, in one of two modes:
//!
//! - **running**: regular entries whose selection rules match are invoked;
//!   error handlers are skipped.
//! - **error mode**: entered when a handler fails; only error handlers run,
//!   each receiving the active error.
//!
//! ```text
//!            next.run()                     error handler: next.run()
//!          ┌──────────┐                   ┌──────────────────────────┐
//!          ▼          │    Err / fail     │                          │
//!     ┌─────────┐─────┘ ───────────────▶ ┌────────────┐              │
//!     │ running │                        │ error mode │──────────────┘
//!     └─────────┘ ◀──────────────────────└────────────┘
//!          │ drop next / end                   │ end with error
//!          ▼                                   ▼
//!     Halted / Exhausted                   Unhandled (logged once)
//! ```
//!
//! A failing error handler never restarts the regular chain; its error
//! replaces the active one and the search continues with the next error
//! handler.

use std::panic::AssertUnwindSafe;

use courier_core::{Request, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::field::{Empty, display};
use tracing::{Instrument, debug, error, info_span, trace};

use crate::error::{BoxError, HandlerPanicked};
use crate::handler::{HandlerResult, Next, Signal};
use crate::stack::{EntryHandler, Stack};

/// How a dispatch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Every entry was considered.
    Exhausted,
    /// A handler returned without calling `next`.
    Halted,
    /// The run ended in error mode; the error was logged.
    Unhandled,
}

/// Summary of one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of handlers invoked.
    pub invoked: usize,
    /// How the run ended.
    pub state: DispatchState,
}

impl DispatchOutcome {
    /// Returns `true` if the run ended with an unhandled error.
    pub fn is_unhandled(&self) -> bool {
        self.state == DispatchState::Unhandled
    }
}

enum Step {
    Continue,
    Fail(BoxError),
    Halt,
}

fn panicked(payload: Box<dyn std::any::Any + Send>) -> BoxError {
    Box::new(HandlerPanicked::from_payload(payload))
}

/// Invokes one handler and waits for its verdict.
///
/// Panics raised while building or polling the handler future are caught.
/// Once the future completes, a returned error wins; otherwise the signal
/// sent through `Next` decides, and a dropped `Next` halts the run.
async fn invoke<F>(call: F, rx: oneshot::Receiver<Signal>) -> Step
where
    F: FnOnce() -> BoxFuture<'static, HandlerResult>,
{
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => fut,
        Err(payload) => return Step::Fail(panicked(payload)),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Err(payload) => Step::Fail(panicked(payload)),
        Ok(Err(err)) => Step::Fail(err),
        Ok(Ok(())) => match rx.await {
            Ok(Signal::Continue) => Step::Continue,
            Ok(Signal::Fail(err)) => Step::Fail(err),
            Err(_) => Step::Halt,
        },
    }
}

/// Runs `req` and `res` through `stack`.
pub async fn dispatch(stack: &Stack, req: Request, res: Response) -> DispatchOutcome {
    let span = info_span!(
        "dispatch",
        request_id = %req.id(),
        request_type = %req.request_type(),
        command = Empty
    );
    let outcome = run(stack, &req, &res).instrument(span.clone()).await;
    span.record("command", display(req.command()));
    outcome
}

async fn run(stack: &Stack, req: &Request, res: &Response) -> DispatchOutcome {
    let mut cursor = 0;
    let mut invoked = 0;
    let mut active: Option<BoxError> = None;

    while let Some(entry) = stack.get(cursor) {
        let index = cursor;
        cursor += 1;

        if !entry.select(req, active.is_some()) {
            trace!(index, kind = %entry.kind(), "Entry skipped");
            continue;
        }

        let (next, rx) = Next::channel();
        let step = match &entry.handler {
            EntryHandler::Regular(handler) => {
                debug!(index, kind = %entry.kind(), "Invoking handler");
                invoked += 1;
                invoke(|| handler.call(req.clone(), res.clone(), next), rx).await
            }
            EntryHandler::Error(handler) => {
                let Some(err) = active.take() else {
                    continue;
                };
                debug!(index, error = %err, "Invoking error handler");
                invoked += 1;
                invoke(|| handler.call(err, req.clone(), res.clone(), next), rx).await
            }
        };

        match step {
            Step::Continue => {}
            Step::Fail(err) => {
                debug!(index, error = %err, "Handler failed, entering error mode");
                active = Some(err);
            }
            Step::Halt => {
                trace!(index, "Chain halted");
                return DispatchOutcome {
                    invoked,
                    state: DispatchState::Halted,
                };
            }
        }
    }

    match active {
        Some(err) => {
            error!(error = %err, command = %req.command(), "Unhandled error in middleware chain");
            DispatchOutcome {
                invoked,
                state: DispatchState::Unhandled,
            }
        }
        None => DispatchOutcome {
            invoked,
            state: DispatchState::Exhausted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxedErrorMiddleware, BoxedMiddleware};
    use crate::route::PatternPath;
    use crate::stack::{EntryKind, StackEntry};
    use courier_core::test_util::MockInteraction;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pair() -> (Request, Response) {
        let trigger = MockInteraction::new("cmd").into_trigger();
        (Request::new(trigger.clone()), Response::new(&trigger))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> BoxedMiddleware {
        let counter = Arc::clone(counter);
        Arc::new(move |_req: Request, _res: Response, next: Next| {
            counter.fetch_add(1, Ordering::SeqCst);
            next.run();
            async {}
        })
    }

    fn use_entry(handler: BoxedMiddleware) -> StackEntry {
        StackEntry::regular(EntryKind::Use, Arc::from(Vec::<PatternPath>::new()), handler)
    }

    fn error_entry(handler: BoxedErrorMiddleware) -> StackEntry {
        StackEntry::error(Arc::from(Vec::<PatternPath>::new()), handler)
    }

    #[tokio::test]
    async fn test_empty_stack_exhausts_silently() {
        let (req, res) = pair();
        let outcome = dispatch(&Stack::new(), req, res).await;
        assert_eq!(
            outcome,
            DispatchOutcome {
                invoked: 0,
                state: DispatchState::Exhausted
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_next_halts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let stack = Stack::new();
        stack.extend([
            use_entry(Arc::new(|_req: Request, _res: Response, _next: Next| async {})),
            use_entry(counting(&counter)),
        ]);

        let (req, res) = pair();
        let outcome = dispatch(&stack, req, res).await;
        assert_eq!(outcome.state, DispatchState::Halted);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_returned_error_beats_next() {
        let stack = Stack::new();
        stack.extend([use_entry(Arc::new(
            |_req: Request, _res: Response, next: Next| async move {
                next.run();
                Err::<(), BoxError>("late failure".into())
            },
        ))]);

        let (req, res) = pair();
        let outcome = dispatch(&stack, req, res).await;
        assert_eq!(outcome.state, DispatchState::Unhandled);
    }

    #[tokio::test]
    async fn test_panic_enters_error_mode() {
        let seen = Arc::new(parking_lot::Mutex::new(String::new()));
        let seen_in_handler = Arc::clone(&seen);
        let stack = Stack::new();
        stack.extend([
            use_entry(Arc::new(|_req: Request, _res: Response, _next: Next| async {
                if true {
                    panic!("kaboom");
                }
            })),
            error_entry(Arc::new(
                move |err: BoxError, _req: Request, _res: Response, _next: Next| {
                    *seen_in_handler.lock() = err.to_string();
                    async {}
                },
            )),
        ]);

        let (req, res) = pair();
        let outcome = dispatch(&stack, req, res).await;
        assert_eq!(outcome.state, DispatchState::Halted);
        assert_eq!(*seen.lock(), "handler panicked: kaboom");
    }

    #[tokio::test]
    async fn test_error_handler_next_resumes_chain() {
        let counter = Arc::new(AtomicUsize::new(0));
        let stack = Stack::new();
        stack.extend([
            use_entry(Arc::new(|_req: Request, _res: Response, next: Next| async move {
                next.fail("first");
            })),
            error_entry(Arc::new(
                |_err: BoxError, _req: Request, _res: Response, next: Next| async move {
                    next.run();
                },
            )),
            use_entry(counting(&counter)),
        ]);

        let (req, res) = pair();
        let outcome = dispatch(&stack, req, res).await;
        assert_eq!(outcome.state, DispatchState::Exhausted);
        assert_eq!(outcome.invoked, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_next_sent_from_spawned_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let stack = Stack::new();
        stack.extend([
            use_entry(Arc::new(|_req: Request, _res: Response, next: Next| async move {
                tokio::spawn(async move { next.run() });
            })),
            use_entry(counting(&counter)),
        ]);

        let (req, res) = pair();
        let outcome = dispatch(&stack, req, res).await;
        assert_eq!(outcome.state, DispatchState::Exhausted);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
