//! Platform collaborator contract.
//!
//! Courier never talks to a chat platform directly. Integrations hand it
//! [`Trigger`]s, each wrapping one of two narrow trait objects:
//!
//! - [`MessageTrigger`] - an incoming text message
//! - [`InteractionTrigger`] - a structured slash-command interaction
//!
//! The variant tag is decided once, at the platform boundary, and never
//! re-derived downstream.
//!
//! Platform objects ([`User`], [`Guild`], [`Channel`]) are plain data owned by
//! the integration; requests hold them behind `Arc`s instead of copying.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlatformResult;
use crate::request::RequestType;

// ============================================================================
// Object Model
// ============================================================================

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake identifier.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Legacy four digit tag; `"0"` on platforms without one.
    #[serde(default)]
    pub discriminator: String,
    /// Whether the account is automated.
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Creates a human user.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            discriminator: "0".to_string(),
            bot: false,
        }
    }

    /// Marks the user as a bot account.
    pub fn with_bot(mut self, bot: bool) -> Self {
        self.bot = bot;
        self
    }

    /// Returns `username#discriminator`.
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}

/// Kind of channel a trigger arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A guild text channel.
    #[default]
    GuildText,
    /// A one-to-one direct message channel.
    Dm,
    /// A thread inside a guild channel.
    Thread,
    /// Anything else.
    Other,
}

/// A platform channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Snowflake identifier.
    pub id: String,
    /// Channel name; DMs have none.
    #[serde(default)]
    pub name: Option<String>,
    /// Channel kind.
    #[serde(default)]
    pub kind: ChannelKind,
}

impl Channel {
    /// Returns `true` for direct message channels.
    pub fn is_dm(&self) -> bool {
        self.kind == ChannelKind::Dm
    }
}

/// A platform guild (server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Snowflake identifier.
    pub id: String,
    /// Guild name.
    pub name: String,
}

// ============================================================================
// Outgoing Messages
// ============================================================================

/// Content of an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageOptions {
    /// Plain text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Platform-specific embed payloads.
    #[serde(default)]
    pub embeds: Vec<Value>,
}

impl MessageOptions {
    /// Creates a text-only message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
        }
    }

    /// Appends an embed.
    pub fn embed(mut self, embed: Value) -> Self {
        self.embeds.push(embed);
        self
    }
}

impl From<&str> for MessageOptions {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for MessageOptions {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

/// What `reply_ephemeral` does when the trigger cannot carry a private reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EphemeralFallback {
    /// Send the reply as a direct message to the author.
    Dm,
    /// Send a regular reply in the channel.
    #[default]
    Normal,
    /// Send nothing.
    Skip,
}

/// Options for a private reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EphemeralOptions {
    /// The message to send.
    pub message: MessageOptions,
    /// Behaviour for triggers without private replies.
    pub fallback: EphemeralFallback,
}

impl EphemeralOptions {
    /// Sets the fallback policy.
    pub fn fallback(mut self, fallback: EphemeralFallback) -> Self {
        self.fallback = fallback;
        self
    }
}

impl From<MessageOptions> for EphemeralOptions {
    fn from(message: MessageOptions) -> Self {
        Self {
            message,
            fallback: EphemeralFallback::default(),
        }
    }
}

impl From<&str> for EphemeralOptions {
    fn from(content: &str) -> Self {
        MessageOptions::text(content).into()
    }
}

impl From<String> for EphemeralOptions {
    fn from(content: String) -> Self {
        MessageOptions::text(content).into()
    }
}

/// Handle to a message the bot has posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Message identifier.
    pub id: String,
    /// Channel the message lives in.
    pub channel_id: String,
    /// Text content as posted.
    #[serde(default)]
    pub content: Option<String>,
}

// ============================================================================
// Message Trigger
// ============================================================================

/// An incoming text message.
#[async_trait]
pub trait MessageTrigger: Send + Sync + 'static {
    /// Message identifier.
    fn id(&self) -> &str;

    /// The author of the message.
    fn author(&self) -> &User;

    /// Raw text content.
    fn content(&self) -> &str;

    /// Channel the message was posted in.
    fn channel_id(&self) -> &str;

    /// Guild the message was posted in, if any.
    fn guild_id(&self) -> Option<&str>;

    /// The channel object, when cached by the platform.
    fn channel(&self) -> Option<Arc<Channel>>;

    /// The guild object, when cached by the platform.
    fn guild(&self) -> Option<Arc<Guild>>;

    /// Identifier of the webhook that posted the message.
    fn webhook_id(&self) -> Option<&str> {
        None
    }

    /// Application that owns the bot, when known.
    fn application_id(&self) -> Option<&str> {
        None
    }

    /// The bot's own user id, used to recognise mentions.
    fn client_user_id(&self) -> Option<&str>;

    /// When the message was created.
    fn created_at(&self) -> DateTime<Utc>;

    /// Posts a new message in the trigger's channel.
    async fn send(&self, options: MessageOptions) -> PlatformResult<SentMessage>;

    /// Posts a reply referencing the trigger.
    async fn reply(&self, options: MessageOptions) -> PlatformResult<SentMessage>;

    /// Sends a direct message to the author.
    async fn send_dm(&self, options: MessageOptions) -> PlatformResult<SentMessage>;

    /// Edits a message previously sent through this trigger.
    async fn edit(
        &self,
        target: &SentMessage,
        options: MessageOptions,
    ) -> PlatformResult<SentMessage>;

    /// Deletes a message previously sent through this trigger.
    async fn delete(&self, target: &SentMessage) -> PlatformResult<()>;
}

// ============================================================================
// Interaction Trigger
// ============================================================================

/// A single resolved interaction option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    /// Option name (kebab-case on the wire).
    pub name: String,
    /// Option value: string, number or boolean.
    pub value: Value,
}

/// Resolved options of a command interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionOptions {
    /// Selected subcommand group, if the command has groups.
    #[serde(default)]
    pub subcommand_group: Option<String>,
    /// Selected subcommand, if the command has subcommands.
    #[serde(default)]
    pub subcommand: Option<String>,
    /// Leaf option values, flattened.
    #[serde(default)]
    pub data: Vec<CommandOption>,
}

impl InteractionOptions {
    /// Returns the selected subcommand.
    pub fn get_subcommand(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    /// Returns the selected subcommand group.
    pub fn get_subcommand_group(&self) -> Option<&str> {
        self.subcommand_group.as_deref()
    }
}

/// A slash-command interaction.
#[async_trait]
pub trait InteractionTrigger: Send + Sync + 'static {
    /// Interaction identifier.
    fn id(&self) -> &str;

    /// The invoking user.
    fn user(&self) -> &User;

    /// Top-level command name.
    fn command_name(&self) -> &str;

    /// Resolved subcommand path and option values.
    fn options(&self) -> &InteractionOptions;

    /// Channel the interaction was invoked in, if any.
    fn channel_id(&self) -> Option<&str>;

    /// Guild the interaction was invoked in, if any.
    fn guild_id(&self) -> Option<&str>;

    /// The channel object, when cached by the platform.
    fn channel(&self) -> Option<Arc<Channel>>;

    /// The guild object, when cached by the platform.
    fn guild(&self) -> Option<Arc<Guild>>;

    /// Application that owns the command.
    fn application_id(&self) -> Option<&str> {
        None
    }

    /// When the interaction was created.
    fn created_at(&self) -> DateTime<Utc>;

    /// Acknowledges the interaction, extending the reply window.
    async fn defer(&self) -> PlatformResult<()>;

    /// Sends the interaction reply, optionally visible only to the invoker.
    async fn reply(&self, options: MessageOptions, ephemeral: bool)
    -> PlatformResult<SentMessage>;

    /// Posts a regular message in the interaction's channel.
    async fn send(&self, options: MessageOptions) -> PlatformResult<SentMessage>;

    /// Edits the interaction reply.
    async fn edit_reply(&self, options: MessageOptions) -> PlatformResult<SentMessage>;

    /// Deletes the interaction reply.
    async fn delete_reply(&self) -> PlatformResult<()>;

    /// Edits a follow-up or channel message sent through this interaction.
    async fn edit_message(
        &self,
        target: &SentMessage,
        options: MessageOptions,
    ) -> PlatformResult<SentMessage>;

    /// Deletes a follow-up or channel message sent through this interaction.
    async fn delete_message(&self, target: &SentMessage) -> PlatformResult<()>;
}

// ============================================================================
// Trigger
// ============================================================================

/// The platform event that starts one dispatch run.
#[derive(Clone)]
pub enum Trigger {
    /// A text message.
    Message(Arc<dyn MessageTrigger>),
    /// A command interaction.
    Interaction(Arc<dyn InteractionTrigger>),
}

impl Trigger {
    /// Wraps a message trigger.
    pub fn message(trigger: impl MessageTrigger) -> Self {
        Self::Message(Arc::new(trigger))
    }

    /// Wraps an interaction trigger.
    pub fn interaction(trigger: impl InteractionTrigger) -> Self {
        Self::Interaction(Arc::new(trigger))
    }

    /// Returns the variant tag.
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Message(_) => RequestType::Message,
            Self::Interaction(_) => RequestType::Interaction,
        }
    }

    /// Returns the trigger's identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Message(m) => m.id(),
            Self::Interaction(i) => i.id(),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("type", &self.request_type())
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
