//! The normalized request.
//!
//! A [`Request`] is built once per [`Trigger`] and shared by every middleware
//! of a dispatch run. Identity fields are read straight from the platform
//! trigger; the three mutable fields ([`CommandPath`], [`Body`] and
//! [`Metadata`]) live behind a lock so that a clone handed to one middleware
//! observes the writes of the previous one.
//!
//! # Command paths
//!
//! | Trigger     | Initial command                          | Initial body      |
//! |-------------|------------------------------------------|-------------------|
//! | Message     | `[None, None, None]`                     | `Text(content)`   |
//! | Interaction | `[name, group, sub]` or `[name, sub, None]` | `Options(data)` |
//!
//! Message commands are filled in later by a parsing middleware.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::body::{Body, Metadata};
use crate::platform::{Channel, Guild, InteractionTrigger, MessageTrigger, Trigger, User};

// ============================================================================
// Request Type
// ============================================================================

/// Which kind of trigger a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// A text message.
    Message,
    /// A command interaction.
    Interaction,
}

impl RequestType {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Interaction => "interaction",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Command Path
// ============================================================================

/// Maximum depth of a command path.
pub const MAX_DEPTH: usize = 3;

/// Three-level command identity: command, subcommand group or subcommand,
/// subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandPath([Option<String>; MAX_DEPTH]);

impl CommandPath {
    /// Creates an empty path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a path from its three segments.
    pub fn new(segments: [Option<String>; MAX_DEPTH]) -> Self {
        Self(segments)
    }

    /// Creates a path from up to three leading segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::default();
        for (slot, segment) in path.0.iter_mut().zip(segments) {
            *slot = Some(segment.into());
        }
        path
    }

    /// Returns the segment at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|s| s.as_deref())
    }

    /// Replaces the segment at `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: Option<String>) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value;
        }
    }

    /// The top-level command name.
    pub fn name(&self) -> Option<&str> {
        self.get(0)
    }

    /// Number of leading defined segments.
    pub fn depth(&self) -> usize {
        self.0.iter().take_while(|s| s.is_some()).count()
    }

    /// Returns `true` if no segment is defined.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Iterates over the three slots.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|s| s.as_deref())
    }

    /// Returns the raw slots.
    pub fn segments(&self) -> &[Option<String>; MAX_DEPTH] {
        &self.0
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.0.iter().flatten() {
            if !first {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

/// Derives the command path an interaction was invoked with.
///
/// A subcommand group occupies position 1 and pushes the subcommand to
/// position 2; without a group the subcommand sits at position 1.
pub fn interaction_command_path(trigger: &dyn InteractionTrigger) -> CommandPath {
    let options = trigger.options();
    let name = Some(trigger.command_name().to_string());
    let group = options.get_subcommand_group().map(str::to_string);
    let sub = options.get_subcommand().map(str::to_string);

    match group {
        Some(group) => CommandPath::new([name, Some(group), sub]),
        None => CommandPath::new([name, sub, None]),
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Default)]
struct PathState {
    command: CommandPath,
    /// Path tokens already removed from the positional arguments.
    consumed: usize,
}

struct RequestInner {
    trigger: Trigger,
    channel: Option<Arc<Channel>>,
    guild: Option<Arc<Guild>>,
    wire_command: CommandPath,
    start_at: DateTime<Utc>,
    // Lock order: `path` before `body`.
    path: Mutex<PathState>,
    body: Mutex<Body>,
    metadata: Mutex<Metadata>,
}

/// A normalized, platform-agnostic view of one trigger.
///
/// Cloning is cheap; all clones share the same mutable state.
///
/// The command path, body and metadata sit behind separate locks, so holding
/// the guard from [`body`](Self::body) while reading
/// [`command`](Self::command) or [`metadata`](Self::metadata) is fine. The
/// locks are not reentrant: a guard must be dropped before the next `.await`,
/// before calling [`set_body`](Self::set_body) or
/// [`consume_path`](Self::consume_path) while holding the body guard, and
/// before taking the same accessor's guard a second time.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    /// Builds a request from a platform trigger.
    pub fn new(trigger: Trigger) -> Self {
        let (channel, guild, wire_command, body) = match &trigger {
            Trigger::Message(message) => (
                message.channel(),
                message.guild(),
                CommandPath::empty(),
                Body::Text(message.content().to_string()),
            ),
            Trigger::Interaction(interaction) => {
                let data: Map<_, _> = interaction
                    .options()
                    .data
                    .iter()
                    .map(|option| (option.name.clone(), option.value.clone()))
                    .collect();
                (
                    interaction.channel(),
                    interaction.guild(),
                    interaction_command_path(&**interaction),
                    Body::Options(data),
                )
            }
        };

        let path = PathState {
            command: wire_command.clone(),
            consumed: 0,
        };

        Self {
            inner: Arc::new(RequestInner {
                trigger,
                channel,
                guild,
                wire_command,
                start_at: Utc::now(),
                path: Mutex::new(path),
                body: Mutex::new(body),
                metadata: Mutex::default(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    /// The variant tag.
    pub fn request_type(&self) -> RequestType {
        self.inner.trigger.request_type()
    }

    /// Returns `true` for message requests.
    pub fn is_message(&self) -> bool {
        self.request_type() == RequestType::Message
    }

    /// Returns `true` for interaction requests.
    pub fn is_interaction(&self) -> bool {
        self.request_type() == RequestType::Interaction
    }

    /// The originating trigger.
    pub fn trigger(&self) -> &Trigger {
        &self.inner.trigger
    }

    /// The message trigger, for message requests.
    pub fn message(&self) -> Option<&Arc<dyn MessageTrigger>> {
        match &self.inner.trigger {
            Trigger::Message(message) => Some(message),
            Trigger::Interaction(_) => None,
        }
    }

    /// The interaction trigger, for interaction requests.
    pub fn interaction(&self) -> Option<&Arc<dyn InteractionTrigger>> {
        match &self.inner.trigger {
            Trigger::Interaction(interaction) => Some(interaction),
            Trigger::Message(_) => None,
        }
    }

    /// Identifier of the trigger.
    pub fn id(&self) -> &str {
        self.inner.trigger.id()
    }

    /// The user who caused the trigger.
    pub fn user(&self) -> &User {
        match &self.inner.trigger {
            Trigger::Message(message) => message.author(),
            Trigger::Interaction(interaction) => interaction.user(),
        }
    }

    /// Alias of [`user`](Self::user).
    pub fn author(&self) -> &User {
        self.user()
    }

    /// Channel identifier, if the trigger has one.
    pub fn channel_id(&self) -> Option<&str> {
        match &self.inner.trigger {
            Trigger::Message(message) => Some(message.channel_id()),
            Trigger::Interaction(interaction) => interaction.channel_id(),
        }
    }

    /// Guild identifier, if the trigger came from a guild.
    pub fn guild_id(&self) -> Option<&str> {
        match &self.inner.trigger {
            Trigger::Message(message) => message.guild_id(),
            Trigger::Interaction(interaction) => interaction.guild_id(),
        }
    }

    /// The channel object, when available.
    pub fn channel(&self) -> Option<&Arc<Channel>> {
        self.inner.channel.as_ref()
    }

    /// The guild object, when available.
    pub fn guild(&self) -> Option<&Arc<Guild>> {
        self.inner.guild.as_ref()
    }

    /// Application identifier, when the platform reports one.
    pub fn application_id(&self) -> Option<&str> {
        match &self.inner.trigger {
            Trigger::Message(message) => message.application_id(),
            Trigger::Interaction(interaction) => interaction.application_id(),
        }
    }

    /// When the platform created the trigger.
    pub fn created_at(&self) -> DateTime<Utc> {
        match &self.inner.trigger {
            Trigger::Message(message) => message.created_at(),
            Trigger::Interaction(interaction) => interaction.created_at(),
        }
    }

    /// When this request was constructed.
    pub fn start_at(&self) -> DateTime<Utc> {
        self.inner.start_at
    }

    /// Returns `true` if the request came from a direct message channel.
    pub fn is_dm(&self) -> bool {
        match self.channel() {
            Some(channel) => channel.is_dm(),
            None => self.guild_id().is_none() && self.is_message(),
        }
    }

    /// The command path as the platform delivered it.
    ///
    /// Interactions carry kebab-case names on the wire; matching compares
    /// converted route segments against this path while
    /// [`command`](Self::command) may hold rewritten casing. Message requests
    /// have no wire path.
    pub fn wire_command(&self) -> &CommandPath {
        &self.inner.wire_command
    }

    // ------------------------------------------------------------------------
    // Mutable state
    // ------------------------------------------------------------------------

    /// A snapshot of the current command path.
    pub fn command(&self) -> CommandPath {
        self.inner.path.lock().command.clone()
    }

    /// Replaces the command path.
    pub fn set_command(&self, command: CommandPath) {
        self.inner.path.lock().command = command;
    }

    /// Mutable access to the body.
    pub fn body(&self) -> MutexGuard<'_, Body> {
        self.inner.body.lock()
    }

    /// Replaces the body.
    pub fn set_body(&self, body: Body) {
        *self.inner.body.lock() = body;
    }

    /// Mutable access to the metadata bag.
    pub fn metadata(&self) -> MutexGuard<'_, Metadata> {
        self.inner.metadata.lock()
    }

    /// Number of path tokens already shifted out of the positional arguments.
    pub fn consumed_depth(&self) -> usize {
        self.inner.path.lock().consumed
    }

    /// Shifts positional arguments so that a command of `depth` segments has
    /// consumed its path tokens.
    ///
    /// The first segment is the command name and is never positional, so a
    /// depth-`n` match consumes `n - 1` tokens in total. Tokens already
    /// consumed by an earlier match are not shifted again. Returns the number
    /// of tokens removed by this call.
    pub fn consume_path(&self, depth: usize) -> usize {
        let mut path = self.inner.path.lock();
        let target = depth.saturating_sub(1);
        if target <= path.consumed {
            return 0;
        }

        let wanted = target - path.consumed;
        path.consumed = target;
        match self.inner.body.lock().as_args_mut() {
            Some(args) => {
                let n = wanted.min(args.positional.len());
                args.positional.drain(..n);
                n
            }
            None => 0,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("type", &self.request_type())
            .field("id", &self.id())
            .field("user", &self.user().id)
            .field("command", &self.inner.path.lock().command)
            .field("body", &*self.inner.body.lock())
            .finish_non_exhaustive()
    }
}

impl From<Trigger> for Request {
    fn from(trigger: Trigger) -> Self {
        Self::new(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ParsedArgs;
    use crate::test_util::{MockInteraction, MockMessage};
    use serde_json::json;

    #[test]
    fn test_message_request_starts_unparsed() {
        let req = Request::new(MockMessage::new("!ping now").into_trigger());

        assert_eq!(req.request_type(), RequestType::Message);
        assert!(req.command().is_empty());
        assert_eq!(req.body().as_text(), Some("!ping now"));
        assert!(req.wire_command().is_empty());
        assert!(req.metadata().is_empty());
    }

    #[test]
    fn test_interaction_without_group_collapses_subcommand() {
        let req = Request::new(
            MockInteraction::new("config")
                .subcommand("set-value")
                .option("key", json!("volume"))
                .into_trigger(),
        );

        assert_eq!(
            req.command(),
            CommandPath::from_segments(["config", "set-value"])
        );
        assert_eq!(req.body().option("key"), Some(&json!("volume")));
    }

    #[test]
    fn test_interaction_with_group_fills_three_levels() {
        let req = Request::new(
            MockInteraction::new("admin")
                .group("users")
                .subcommand("ban")
                .into_trigger(),
        );

        assert_eq!(
            req.command(),
            CommandPath::from_segments(["admin", "users", "ban"])
        );
        assert_eq!(req.command().to_string(), "admin/users/ban");
    }

    #[test]
    fn test_clones_share_state() {
        let req = Request::new(MockMessage::new("hello").into_trigger());
        let other = req.clone();

        other.set_command(CommandPath::from_segments(["echo"]));
        other.metadata().insert("seen", true);

        assert_eq!(req.command().name(), Some("echo"));
        assert_eq!(req.metadata().get("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_body_guard_allows_path_and_metadata_reads() {
        let req = Request::new(MockMessage::new("!ping").into_trigger());
        req.set_command(CommandPath::from_segments(["ping"]));

        let body = req.body();
        assert_eq!(req.command().name(), Some("ping"));
        req.metadata().insert("prefix", "!");
        assert_eq!(body.as_text(), Some("!ping"));
        drop(body);

        assert_eq!(req.metadata().get("prefix"), Some(&json!("!")));
    }

    #[test]
    fn test_consume_path_is_idempotent_per_depth() {
        let req = Request::new(MockMessage::new("!a b c d").into_trigger());
        req.set_body(Body::Args(ParsedArgs {
            positional: vec!["b".into(), "c".into(), "d".into()],
            ..Default::default()
        }));

        assert_eq!(req.consume_path(1), 0);
        assert_eq!(req.consume_path(2), 1);
        assert_eq!(req.consume_path(2), 0);
        assert_eq!(
            req.body().positional(),
            Some(&["c".to_string(), "d".to_string()][..])
        );

        assert_eq!(req.consume_path(3), 1);
        assert_eq!(req.body().positional(), Some(&["d".to_string()][..]));
        assert_eq!(req.consumed_depth(), 2);
    }

    #[test]
    fn test_dm_detection() {
        let guild = Request::new(MockMessage::new("x").into_trigger());
        let dm = Request::new(MockMessage::new("x").in_dm().into_trigger());

        assert!(!guild.is_dm());
        assert!(dm.is_dm());
    }
}
