//! The response adapter.
//!
//! [`Response`] gives handlers one capability set for both trigger kinds:
//! `defer`, `send`, `reply`, `reply_ephemeral`, `edit` and `del`. It keeps
//! the ordered list of messages sent so far so that `edit` and `del` can act
//! on the latest one without an explicit target.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{PlatformError, ResponseError, ResponseResult};
use crate::platform::{
    EphemeralFallback, EphemeralOptions, InteractionTrigger, MessageOptions, MessageTrigger,
    SentMessage, Trigger,
};
use crate::request::RequestType;

#[derive(Debug, Default)]
struct InteractionState {
    deferred: bool,
    replied: bool,
}

enum ResponseKind {
    Message(Arc<dyn MessageTrigger>),
    Interaction {
        trigger: Arc<dyn InteractionTrigger>,
        state: Mutex<InteractionState>,
    },
}

/// How a sent message is reached again for `edit` and `del`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// The original interaction reply.
    InteractionReply,
    /// A channel message, message reply, DM or interaction follow-up.
    Posted,
}

#[derive(Debug, Clone)]
struct Sent {
    message: SentMessage,
    origin: Origin,
}

struct ResponseInner {
    kind: ResponseKind,
    sent: Mutex<Vec<Sent>>,
}

/// Reply handle for one trigger.
///
/// Cloning is cheap; all clones share the sent-message list.
#[derive(Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

impl Response {
    /// Creates the response adapter for a trigger.
    pub fn new(trigger: &Trigger) -> Self {
        let kind = match trigger {
            Trigger::Message(message) => ResponseKind::Message(Arc::clone(message)),
            Trigger::Interaction(interaction) => ResponseKind::Interaction {
                trigger: Arc::clone(interaction),
                state: Mutex::default(),
            },
        };
        Self {
            inner: Arc::new(ResponseInner {
                kind,
                sent: Mutex::default(),
            }),
        }
    }

    /// The variant tag of the wrapped trigger.
    pub fn request_type(&self) -> RequestType {
        match self.inner.kind {
            ResponseKind::Message(_) => RequestType::Message,
            ResponseKind::Interaction { .. } => RequestType::Interaction,
        }
    }

    /// Messages sent through this response, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.inner
            .sent
            .lock()
            .iter()
            .map(|sent| sent.message.clone())
            .collect()
    }

    /// The most recently sent message.
    pub fn last_sent(&self) -> Option<SentMessage> {
        self.inner.sent.lock().last().map(|sent| sent.message.clone())
    }

    /// Returns `true` once an interaction has been deferred.
    pub fn is_deferred(&self) -> bool {
        match &self.inner.kind {
            ResponseKind::Message(_) => false,
            ResponseKind::Interaction { state, .. } => state.lock().deferred,
        }
    }

    /// Returns `true` once an interaction has been replied to.
    pub fn is_replied(&self) -> bool {
        match &self.inner.kind {
            ResponseKind::Message(_) => !self.inner.sent.lock().is_empty(),
            ResponseKind::Interaction { state, .. } => state.lock().replied,
        }
    }

    fn record(&self, message: SentMessage, origin: Origin) -> SentMessage {
        self.inner.sent.lock().push(Sent {
            message: message.clone(),
            origin,
        });
        message
    }

    fn last_entry(&self) -> Option<Sent> {
        self.inner.sent.lock().last().cloned()
    }

    /// Swaps the entry for `target` with its edited form.
    fn replace(&self, target: &str, edited: &SentMessage) {
        let mut sent = self.inner.sent.lock();
        if let Some(entry) = sent.iter_mut().rev().find(|s| s.message.id == target) {
            entry.message = edited.clone();
        }
    }

    fn forget(&self, target: &str) {
        let mut sent = self.inner.sent.lock();
        if let Some(index) = sent.iter().rposition(|s| s.message.id == target) {
            sent.remove(index);
        }
    }

    /// Sends through the interaction reply path, which becomes a follow-up
    /// once the interaction was answered.
    async fn interaction_reply(
        trigger: &Arc<dyn InteractionTrigger>,
        state: &Mutex<InteractionState>,
        options: MessageOptions,
        ephemeral: bool,
    ) -> ResponseResult<(SentMessage, Origin)> {
        let origin = if state.lock().replied {
            Origin::Posted
        } else {
            Origin::InteractionReply
        };
        let message = trigger.reply(options, ephemeral).await?;
        state.lock().replied = true;
        Ok((message, origin))
    }

    /// Signals that a reply will follow later.
    ///
    /// A no-op for messages.
    pub async fn defer(&self) -> ResponseResult<()> {
        match &self.inner.kind {
            ResponseKind::Message(_) => Ok(()),
            ResponseKind::Interaction { trigger, state } => {
                trigger.defer().await?;
                state.lock().deferred = true;
                Ok(())
            }
        }
    }

    /// Posts a new message in the trigger's channel.
    ///
    /// Interactions without a channel fall back to the interaction reply.
    pub async fn send(&self, options: impl Into<MessageOptions>) -> ResponseResult<SentMessage> {
        let options = options.into();
        let (message, origin) = match &self.inner.kind {
            ResponseKind::Message(trigger) => (trigger.send(options).await?, Origin::Posted),
            ResponseKind::Interaction { trigger, state } => {
                if trigger.channel_id().is_some() {
                    (trigger.send(options).await?, Origin::Posted)
                } else {
                    Self::interaction_reply(trigger, state, options, false).await?
                }
            }
        };
        Ok(self.record(message, origin))
    }

    /// Posts a reply referencing the trigger.
    pub async fn reply(&self, options: impl Into<MessageOptions>) -> ResponseResult<SentMessage> {
        let options = options.into();
        let (message, origin) = match &self.inner.kind {
            ResponseKind::Message(trigger) => (trigger.reply(options).await?, Origin::Posted),
            ResponseKind::Interaction { trigger, state } => {
                Self::interaction_reply(trigger, state, options, false).await?
            }
        };
        Ok(self.record(message, origin))
    }

    /// Posts a reply only the requester can see.
    ///
    /// Messages cannot carry private replies, so the options' fallback
    /// decides: a direct message, a normal reply, or nothing (`Ok(None)`).
    /// A direct message the platform refuses is retried as a normal reply.
    pub async fn reply_ephemeral(
        &self,
        options: impl Into<EphemeralOptions>,
    ) -> ResponseResult<Option<SentMessage>> {
        let EphemeralOptions { message, fallback } = options.into();
        let (sent, origin) = match &self.inner.kind {
            ResponseKind::Interaction { trigger, state } => {
                Self::interaction_reply(trigger, state, message, true).await?
            }
            ResponseKind::Message(trigger) => (
                match fallback {
                    EphemeralFallback::Skip => return Ok(None),
                    EphemeralFallback::Normal => trigger.reply(message).await?,
                    EphemeralFallback::Dm => match trigger.send_dm(message.clone()).await {
                        Ok(sent) => sent,
                        Err(PlatformError::DmBlocked { user_id }) => {
                            warn!(
                                user_id = %user_id,
                                "Direct message refused, replying in channel instead"
                            );
                            trigger.reply(message).await?
                        }
                        Err(e) => return Err(e.into()),
                    },
                },
                Origin::Posted,
            ),
        };
        Ok(Some(self.record(sent, origin)))
    }

    /// Edits the most recently sent message.
    ///
    /// A deferred interaction with nothing sent yet edits its pending reply.
    /// Otherwise fails with [`ResponseError::NoResponseYet`] when nothing was
    /// sent.
    pub async fn edit(&self, options: impl Into<MessageOptions>) -> ResponseResult<SentMessage> {
        let options = options.into();
        let Some(target) = self.last_entry() else {
            return match &self.inner.kind {
                ResponseKind::Interaction { trigger, state } if state.lock().deferred => {
                    let edited = trigger.edit_reply(options).await?;
                    state.lock().replied = true;
                    Ok(self.record(edited, Origin::InteractionReply))
                }
                _ => Err(ResponseError::NoResponseYet),
            };
        };

        let edited = match (&self.inner.kind, target.origin) {
            (ResponseKind::Message(trigger), _) => trigger.edit(&target.message, options).await?,
            (ResponseKind::Interaction { trigger, .. }, Origin::InteractionReply) => {
                trigger.edit_reply(options).await?
            }
            (ResponseKind::Interaction { trigger, .. }, Origin::Posted) => {
                trigger.edit_message(&target.message, options).await?
            }
        };
        self.replace(&target.message.id, &edited);
        Ok(edited)
    }

    /// Deletes the most recently sent message.
    ///
    /// The message leaves the sent list only once the platform confirms.
    pub async fn del(&self) -> ResponseResult<()> {
        let target = self.last_entry().ok_or(ResponseError::NoResponseYet)?;
        match (&self.inner.kind, target.origin) {
            (ResponseKind::Message(trigger), _) => trigger.delete(&target.message).await?,
            (ResponseKind::Interaction { trigger, .. }, Origin::InteractionReply) => {
                trigger.delete_reply().await?
            }
            (ResponseKind::Interaction { trigger, .. }, Origin::Posted) => {
                trigger.delete_message(&target.message).await?
            }
        }
        self.forget(&target.message.id);
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("type", &self.request_type())
            .field("sent", &self.inner.sent.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MockInteraction, MockMessage, PlatformCall};

    #[tokio::test]
    async fn test_message_edit_and_del_target_latest() {
        let mock = MockMessage::new("!hi");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.send("first").await.unwrap();
        res.reply("second").await.unwrap();
        res.edit("second, edited").await.unwrap();
        assert_eq!(res.sent().len(), 2);
        assert_eq!(
            res.last_sent().and_then(|m| m.content),
            Some("second, edited".to_string())
        );

        res.del().await.unwrap();
        assert_eq!(res.sent().len(), 1);

        let log = calls.lock().clone();
        assert!(matches!(log[0], PlatformCall::Send(_)));
        assert!(matches!(log[1], PlatformCall::Reply { .. }));
        assert!(matches!(log[2], PlatformCall::Edit { .. }));
        assert!(matches!(log[3], PlatformCall::Delete { .. }));
    }

    #[tokio::test]
    async fn test_edit_without_response_fails() {
        let res = Response::new(&MockMessage::new("x").into_trigger());
        assert!(matches!(
            res.edit("nope").await,
            Err(ResponseError::NoResponseYet)
        ));
        assert!(matches!(res.del().await, Err(ResponseError::NoResponseYet)));

        let res = Response::new(&MockInteraction::new("cmd").into_trigger());
        assert!(matches!(
            res.edit("nope").await,
            Err(ResponseError::NoResponseYet)
        ));
    }

    #[tokio::test]
    async fn test_message_defer_is_noop() {
        let mock = MockMessage::new("x");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.defer().await.unwrap();
        assert!(calls.lock().is_empty());
        assert!(!res.is_deferred());
    }

    #[tokio::test]
    async fn test_ephemeral_fallbacks_on_message() {
        let mock = MockMessage::new("x");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        let skipped = res
            .reply_ephemeral(EphemeralOptions::from("a").fallback(EphemeralFallback::Skip))
            .await
            .unwrap();
        assert!(skipped.is_none());

        res.reply_ephemeral("b").await.unwrap();
        res.reply_ephemeral(EphemeralOptions::from("c").fallback(EphemeralFallback::Dm))
            .await
            .unwrap();

        let log = calls.lock().clone();
        assert_eq!(log.len(), 2);
        assert!(matches!(log[0], PlatformCall::Reply { .. }));
        assert!(matches!(log[1], PlatformCall::SendDm(_)));
    }

    #[tokio::test]
    async fn test_blocked_dm_retries_as_reply() {
        let mock = MockMessage::new("x").dm_blocked();
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        let sent = res
            .reply_ephemeral(EphemeralOptions::from("hi").fallback(EphemeralFallback::Dm))
            .await
            .unwrap();
        assert!(sent.is_some());

        let log = calls.lock().clone();
        assert!(matches!(log.last(), Some(PlatformCall::Reply { .. })));
    }

    #[tokio::test]
    async fn test_interaction_reply_ephemeral_and_edit() {
        let mock = MockInteraction::new("cmd");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.defer().await.unwrap();
        assert!(res.is_deferred());
        res.edit("done").await.unwrap();
        res.reply_ephemeral("secret").await.unwrap();

        let log = calls.lock().clone();
        assert!(matches!(log[0], PlatformCall::Defer));
        assert!(matches!(log[1], PlatformCall::EditReply(_)));
        assert!(matches!(log[2], PlatformCall::Reply { ephemeral: true, .. }));
    }

    #[tokio::test]
    async fn test_interaction_send_without_channel_replies() {
        let mock = MockInteraction::new("cmd").without_channel();
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.send("hello").await.unwrap();
        assert!(res.is_replied());
        assert!(matches!(
            calls.lock()[0],
            PlatformCall::Reply { ephemeral: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_interaction_edit_after_send_targets_channel_message() {
        let mock = MockInteraction::new("cmd");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        let sent = res.send("hello").await.unwrap();
        let edited = res.edit("edited").await.unwrap();

        assert_eq!(edited.id, sent.id);
        assert_eq!(res.sent().len(), 1);
        assert_eq!(res.last_sent().and_then(|m| m.content), Some("edited".to_string()));
        assert_eq!(
            calls.lock()[1],
            PlatformCall::Edit {
                target: sent.id,
                options: MessageOptions::text("edited"),
            }
        );
    }

    #[tokio::test]
    async fn test_interaction_del_pops_latest() {
        let mock = MockInteraction::new("cmd");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.reply("first").await.unwrap();
        let notice = res.send("second").await.unwrap();

        res.del().await.unwrap();
        assert_eq!(res.last_sent().and_then(|m| m.content), Some("first".to_string()));
        res.del().await.unwrap();
        assert!(res.last_sent().is_none());
        assert!(matches!(res.del().await, Err(ResponseError::NoResponseYet)));

        let log = calls.lock().clone();
        assert_eq!(log[2], PlatformCall::Delete { target: notice.id });
        assert_eq!(log[3], PlatformCall::DeleteReply);
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_interaction_follow_up_is_edited_as_message() {
        let mock = MockInteraction::new("cmd");
        let calls = mock.calls();
        let res = Response::new(&mock.into_trigger());

        res.reply("first").await.unwrap();
        let follow_up = res.reply_ephemeral("second").await.unwrap().unwrap();
        res.edit("second, edited").await.unwrap();

        assert!(matches!(
            calls.lock().last(),
            Some(PlatformCall::Edit { target, .. }) if *target == follow_up.id
        ));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_message() {
        let mock = MockMessage::new("x").delete_fails();
        let res = Response::new(&mock.into_trigger());
        res.reply("stays").await.unwrap();

        assert!(matches!(
            res.del().await,
            Err(ResponseError::Platform(PlatformError::NotFound { .. }))
        ));
        assert_eq!(res.sent().len(), 1);

        let mock = MockInteraction::new("cmd").delete_fails();
        let res = Response::new(&mock.into_trigger());
        res.reply("stays").await.unwrap();

        assert!(res.del().await.is_err());
        assert_eq!(res.last_sent().and_then(|m| m.content), Some("stays".to_string()));
    }

    #[tokio::test]
    async fn test_platform_errors_surface() {
        let mock = MockInteraction::new("cmd").expired();
        let res = Response::new(&mock.into_trigger());

        assert!(matches!(
            res.defer().await,
            Err(ResponseError::Platform(PlatformError::ReplyWindowExpired))
        ));
    }
}
