//! In-memory platform triggers for tests.
//!
//! [`MockMessage`] and [`MockInteraction`] implement the trigger traits
//! without a network and record every outgoing call as a [`PlatformCall`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{PlatformError, PlatformResult};
use crate::platform::{
    Channel, ChannelKind, CommandOption, Guild, InteractionOptions, InteractionTrigger,
    MessageOptions, MessageTrigger, SentMessage, Trigger, User,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A recorded outgoing platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    /// Channel message.
    Send(MessageOptions),
    /// Reply to the trigger.
    Reply {
        /// Message content.
        options: MessageOptions,
        /// Whether the reply was private.
        ephemeral: bool,
    },
    /// Direct message to the author.
    SendDm(MessageOptions),
    /// Edit of a sent message.
    Edit {
        /// Edited message id.
        target: String,
        /// New content.
        options: MessageOptions,
    },
    /// Deletion of a sent message.
    Delete {
        /// Deleted message id.
        target: String,
    },
    /// Interaction deferral.
    Defer,
    /// Edit of the interaction reply.
    EditReply(MessageOptions),
    /// Deletion of the interaction reply.
    DeleteReply,
}

/// Shared log of platform calls.
pub type CallLog = Arc<Mutex<Vec<PlatformCall>>>;

fn sent(channel_id: &str, options: &MessageOptions) -> SentMessage {
    SentMessage {
        id: next_id("sent"),
        channel_id: channel_id.to_string(),
        content: options.content.clone(),
    }
}

fn guild_channel(id: &str) -> Arc<Channel> {
    Arc::new(Channel {
        id: id.to_string(),
        name: Some("general".to_string()),
        kind: ChannelKind::GuildText,
    })
}

fn test_guild(id: &str) -> Arc<Guild> {
    Arc::new(Guild {
        id: id.to_string(),
        name: "Test Guild".to_string(),
    })
}

// ============================================================================
// Mock Message
// ============================================================================

/// An in-memory text message.
#[derive(Debug, Clone)]
pub struct MockMessage {
    id: String,
    author: User,
    content: String,
    channel: Arc<Channel>,
    guild: Option<Arc<Guild>>,
    webhook_id: Option<String>,
    client_user_id: Option<String>,
    created_at: DateTime<Utc>,
    dm_blocked: bool,
    delete_fails: bool,
    calls: CallLog,
}

impl MockMessage {
    /// Creates a guild message from `user-1` in `channel-1`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: next_id("message"),
            author: User::new("user-1", "tester"),
            content: content.into(),
            channel: guild_channel("channel-1"),
            guild: Some(test_guild("guild-1")),
            webhook_id: None,
            client_user_id: Some("bot-1".to_string()),
            created_at: Utc::now(),
            dm_blocked: false,
            delete_fails: false,
            calls: CallLog::default(),
        }
    }

    /// Sets the author.
    pub fn author(mut self, author: User) -> Self {
        self.author = author;
        self
    }

    /// Marks the author as a bot.
    pub fn from_bot(mut self) -> Self {
        self.author.bot = true;
        self
    }

    /// Moves the message into a DM channel.
    pub fn in_dm(mut self) -> Self {
        self.channel = Arc::new(Channel {
            id: "dm-1".to_string(),
            name: None,
            kind: ChannelKind::Dm,
        });
        self.guild = None;
        self
    }

    /// Sets the guild id.
    pub fn guild(mut self, id: &str) -> Self {
        self.guild = Some(test_guild(id));
        self
    }

    /// Sets the channel id.
    pub fn channel(mut self, id: &str) -> Self {
        self.channel = guild_channel(id);
        self
    }

    /// Marks the message as posted by a webhook.
    pub fn webhook(mut self, id: &str) -> Self {
        self.webhook_id = Some(id.to_string());
        self
    }

    /// Sets the bot's own user id; `None` simulates an unready client.
    pub fn client_user(mut self, id: Option<&str>) -> Self {
        self.client_user_id = id.map(str::to_string);
        self
    }

    /// Makes `send_dm` fail as if the author closed their DMs.
    pub fn dm_blocked(mut self) -> Self {
        self.dm_blocked = true;
        self
    }

    /// Makes `delete` fail as if the message was already gone.
    pub fn delete_fails(mut self) -> Self {
        self.delete_fails = true;
        self
    }

    /// Returns the shared call log.
    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    /// Wraps the mock in a [`Trigger`].
    pub fn into_trigger(self) -> Trigger {
        Trigger::message(self)
    }
}

#[async_trait]
impl MessageTrigger for MockMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn author(&self) -> &User {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn channel_id(&self) -> &str {
        &self.channel.id
    }

    fn guild_id(&self) -> Option<&str> {
        self.guild.as_ref().map(|g| g.id.as_str())
    }

    fn channel(&self) -> Option<Arc<Channel>> {
        Some(Arc::clone(&self.channel))
    }

    fn guild(&self) -> Option<Arc<Guild>> {
        self.guild.clone()
    }

    fn webhook_id(&self) -> Option<&str> {
        self.webhook_id.as_deref()
    }

    fn client_user_id(&self) -> Option<&str> {
        self.client_user_id.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    async fn send(&self, options: MessageOptions) -> PlatformResult<SentMessage> {
        let message = sent(&self.channel.id, &options);
        self.calls.lock().push(PlatformCall::Send(options));
        Ok(message)
    }

    async fn reply(&self, options: MessageOptions) -> PlatformResult<SentMessage> {
        let message = sent(&self.channel.id, &options);
        self.calls.lock().push(PlatformCall::Reply {
            options,
            ephemeral: false,
        });
        Ok(message)
    }

    async fn send_dm(&self, options: MessageOptions) -> PlatformResult<SentMessage> {
        if self.dm_blocked {
            return Err(PlatformError::DmBlocked {
                user_id: self.author.id.clone(),
            });
        }
        let message = sent("dm-1", &options);
        self.calls.lock().push(PlatformCall::SendDm(options));
        Ok(message)
    }

    async fn edit(
        &self,
        target: &SentMessage,
        options: MessageOptions,
    ) -> PlatformResult<SentMessage> {
        let message = SentMessage {
            content: options.content.clone(),
            ..target.clone()
        };
        self.calls.lock().push(PlatformCall::Edit {
            target: target.id.clone(),
            options,
        });
        Ok(message)
    }

    async fn delete(&self, target: &SentMessage) -> PlatformResult<()> {
        if self.delete_fails {
            return Err(PlatformError::not_found("message", target.id.clone()));
        }
        self.calls.lock().push(PlatformCall::Delete {
            target: target.id.clone(),
        });
        Ok(())
    }
}

// ============================================================================
// Mock Interaction
// ============================================================================

/// An in-memory slash-command interaction.
#[derive(Debug, Clone)]
pub struct MockInteraction {
    id: String,
    user: User,
    command_name: String,
    options: InteractionOptions,
    channel: Option<Arc<Channel>>,
    guild: Option<Arc<Guild>>,
    created_at: DateTime<Utc>,
    expired: bool,
    delete_fails: bool,
    calls: CallLog,
}

impl MockInteraction {
    /// Creates an interaction for `command_name` from `user-1`.
    pub fn new(command_name: impl Into<String>) -> Self {
        Self {
            id: next_id("interaction"),
            user: User::new("user-1", "tester"),
            command_name: command_name.into(),
            options: InteractionOptions::default(),
            channel: Some(guild_channel("channel-1")),
            guild: Some(test_guild("guild-1")),
            created_at: Utc::now(),
            expired: false,
            delete_fails: false,
            calls: CallLog::default(),
        }
    }

    /// Sets the subcommand group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.options.subcommand_group = Some(group.into());
        self
    }

    /// Sets the subcommand.
    pub fn subcommand(mut self, sub: impl Into<String>) -> Self {
        self.options.subcommand = Some(sub.into());
        self
    }

    /// Adds a leaf option.
    pub fn option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.data.push(CommandOption {
            name: name.into(),
            value,
        });
        self
    }

    /// Sets the invoking user.
    pub fn user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Removes the channel, as for interactions in uncached contexts.
    pub fn without_channel(mut self) -> Self {
        self.channel = None;
        self
    }

    /// Makes every acknowledgement fail with an expired reply window.
    pub fn expired(mut self) -> Self {
        self.expired = true;
        self
    }

    /// Makes every deletion fail as if the message was already gone.
    pub fn delete_fails(mut self) -> Self {
        self.delete_fails = true;
        self
    }

    /// Returns the shared call log.
    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    /// Wraps the mock in a [`Trigger`].
    pub fn into_trigger(self) -> Trigger {
        Trigger::interaction(self)
    }

    fn check_window(&self) -> PlatformResult<()> {
        if self.expired {
            Err(PlatformError::ReplyWindowExpired)
        } else {
            Ok(())
        }
    }

    fn check_gone(&self) -> PlatformResult<()> {
        if self.delete_fails {
            Err(PlatformError::not_found("message", self.id.clone()))
        } else {
            Ok(())
        }
    }

    fn reply_channel(&self) -> &str {
        self.channel.as_ref().map_or("interaction", |c| c.id.as_str())
    }
}

#[async_trait]
impl InteractionTrigger for MockInteraction {
    fn id(&self) -> &str {
        &self.id
    }

    fn user(&self) -> &User {
        &self.user
    }

    fn command_name(&self) -> &str {
        &self.command_name
    }

    fn options(&self) -> &InteractionOptions {
        &self.options
    }

    fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.id.as_str())
    }

    fn guild_id(&self) -> Option<&str> {
        self.guild.as_ref().map(|g| g.id.as_str())
    }

    fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.clone()
    }

    fn guild(&self) -> Option<Arc<Guild>> {
        self.guild.clone()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    async fn defer(&self) -> PlatformResult<()> {
        self.check_window()?;
        self.calls.lock().push(PlatformCall::Defer);
        Ok(())
    }

    async fn reply(
        &self,
        options: MessageOptions,
        ephemeral: bool,
    ) -> PlatformResult<SentMessage> {
        self.check_window()?;
        let message = sent(self.reply_channel(), &options);
        self.calls
            .lock()
            .push(PlatformCall::Reply { options, ephemeral });
        Ok(message)
    }

    async fn send(&self, options: MessageOptions) -> PlatformResult<SentMessage> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| PlatformError::not_found("channel", "none"))?;
        let message = sent(&channel.id, &options);
        self.calls.lock().push(PlatformCall::Send(options));
        Ok(message)
    }

    async fn edit_reply(&self, options: MessageOptions) -> PlatformResult<SentMessage> {
        let message = sent(self.reply_channel(), &options);
        self.calls.lock().push(PlatformCall::EditReply(options));
        Ok(message)
    }

    async fn delete_reply(&self) -> PlatformResult<()> {
        self.check_gone()?;
        self.calls.lock().push(PlatformCall::DeleteReply);
        Ok(())
    }

    async fn edit_message(
        &self,
        target: &SentMessage,
        options: MessageOptions,
    ) -> PlatformResult<SentMessage> {
        let message = SentMessage {
            content: options.content.clone(),
            ..target.clone()
        };
        self.calls.lock().push(PlatformCall::Edit {
            target: target.id.clone(),
            options,
        });
        Ok(message)
    }

    async fn delete_message(&self, target: &SentMessage) -> PlatformResult<()> {
        self.check_gone()?;
        self.calls.lock().push(PlatformCall::Delete {
            target: target.id.clone(),
        });
        Ok(())
    }
}
