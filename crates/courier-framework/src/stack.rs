//! The middleware stack.
//!
//! The stack is an ordered list of [`StackEntry`]s shared by every clone of a
//! [`Router`](crate::Router). Dispatch reads it by index, one entry per step,
//! so entries registered between runs are seen by the next run.

use std::fmt;
use std::sync::Arc;

use courier_core::{Request, RequestType};
use parking_lot::RwLock;

use crate::handler::{BoxedErrorMiddleware, BoxedMiddleware};
use crate::matcher::{MatchMode, first_match};
use crate::route::PatternPath;

/// The category of a stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Untargeted middleware; runs for every request.
    Use,
    /// Middleware mounted on route prefixes; runs for any request type.
    UseRouted,
    /// Command handler for any request type.
    Command,
    /// Command handler for message requests only.
    MessageCommand,
    /// Command handler for interaction requests only.
    InteractionCommand,
    /// Error handler, optionally targeted.
    Error,
}

impl EntryKind {
    /// Returns a short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::UseRouted => "use-routed",
            Self::Command => "command",
            Self::MessageCommand => "message-command",
            Self::InteractionCommand => "interaction-command",
            Self::Error => "error",
        }
    }

    fn request_filter(&self) -> Option<RequestType> {
        match self {
            Self::MessageCommand => Some(RequestType::Message),
            Self::InteractionCommand => Some(RequestType::Interaction),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored callback of an entry.
#[derive(Clone)]
pub(crate) enum EntryHandler {
    Regular(BoxedMiddleware),
    Error(BoxedErrorMiddleware),
}

/// A registered handler with its routing data.
#[derive(Clone)]
pub struct StackEntry {
    kind: EntryKind,
    patterns: Arc<[PatternPath]>,
    pub(crate) handler: EntryHandler,
}

impl StackEntry {
    pub(crate) fn regular(
        kind: EntryKind,
        patterns: Arc<[PatternPath]>,
        handler: BoxedMiddleware,
    ) -> Self {
        Self {
            kind,
            patterns,
            handler: EntryHandler::Regular(handler),
        }
    }

    pub(crate) fn error(patterns: Arc<[PatternPath]>, handler: BoxedErrorMiddleware) -> Self {
        Self {
            kind: EntryKind::Error,
            patterns,
            handler: EntryHandler::Error(handler),
        }
    }

    /// The entry's category.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The entry's route patterns; empty for untargeted entries.
    pub fn patterns(&self) -> &[PatternPath] {
        &self.patterns
    }

    /// Returns `true` if the entry should run for `req` in the given mode.
    ///
    /// A successful route match is applied to the request (case
    /// reconciliation and positional shift). Within one entry only the first
    /// matching pattern counts.
    pub fn select(&self, req: &Request, error_mode: bool) -> bool {
        if error_mode != (self.kind == EntryKind::Error) {
            return false;
        }
        if self
            .kind
            .request_filter()
            .is_some_and(|only| req.request_type() != only)
        {
            return false;
        }

        match self.kind {
            EntryKind::Use => true,
            EntryKind::Error if self.patterns.is_empty() => true,
            EntryKind::UseRouted => first_match(&self.patterns, req, MatchMode::Prefix).is_some(),
            _ => first_match(&self.patterns, req, MatchMode::Command).is_some(),
        }
    }
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<String> = self.patterns.iter().map(ToString::to_string).collect();
        f.debug_struct("StackEntry")
            .field("kind", &self.kind)
            .field("routes", &routes)
            .finish_non_exhaustive()
    }
}

/// Shared, ordered list of entries.
#[derive(Clone, Default)]
pub struct Stack {
    entries: Arc<RwLock<Vec<StackEntry>>>,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends entries atomically, preserving their order.
    pub fn extend(&self, entries: impl IntoIterator<Item = StackEntry>) {
        self.entries.write().extend(entries);
    }

    /// Returns a clone of the entry at `index`.
    pub fn get(&self, index: usize) -> Option<StackEntry> {
        self.entries.read().get(index).cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("entries", &*self.entries.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Next;
    use courier_core::Response;
    use courier_core::test_util::{MockInteraction, MockMessage};

    fn noop() -> BoxedMiddleware {
        Arc::new(|_req: Request, _res: Response, next: Next| async move { next.run() })
    }

    fn routes(routes: &[&str]) -> Arc<[PatternPath]> {
        routes
            .iter()
            .map(|r| PatternPath::parse(r).unwrap())
            .collect()
    }

    fn parsed(name: &str) -> Request {
        let req = Request::new(MockMessage::new("!").into_trigger());
        req.set_command(courier_core::CommandPath::from_segments([name]));
        req
    }

    #[test]
    fn test_use_runs_only_in_normal_mode() {
        let entry = StackEntry::regular(EntryKind::Use, routes(&[]), noop());
        let req = parsed("anything");
        assert!(entry.select(&req, false));
        assert!(!entry.select(&req, true));
    }

    #[test]
    fn test_variant_restricted_commands() {
        let msg_only = StackEntry::regular(EntryKind::MessageCommand, routes(&["ping"]), noop());
        let int_only =
            StackEntry::regular(EntryKind::InteractionCommand, routes(&["ping"]), noop());
        let any = StackEntry::regular(EntryKind::Command, routes(&["ping"]), noop());

        let message = parsed("ping");
        let interaction = Request::new(MockInteraction::new("ping").into_trigger());

        assert!(msg_only.select(&message, false));
        assert!(!msg_only.select(&interaction, false));
        assert!(int_only.select(&interaction, false));
        assert!(!int_only.select(&message, false));
        assert!(any.select(&message, false));
        assert!(any.select(&interaction, false));
    }

    #[test]
    fn test_stack_is_shared_between_clones() {
        let stack = Stack::new();
        let other = stack.clone();
        other.extend([StackEntry::regular(EntryKind::Use, routes(&[]), noop())]);

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.get(0).map(|e| e.kind()), Some(EntryKind::Use));
        assert!(stack.get(1).is_none());
    }
}
