//! Error types for the Courier core.
//!
//! Failures reported by the chat platform surface as [`PlatformError`].
//! [`Response`](crate::Response) methods wrap them in [`ResponseError`] so a
//! handler sees a single error type for everything it can do with a reply.

use thiserror::Error;

// =============================================================================
// Platform Errors
// =============================================================================

/// Errors reported by the platform collaborator.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The interaction can no longer be acknowledged.
    #[error("interaction reply window has expired")]
    ReplyWindowExpired,

    /// The interaction was already acknowledged.
    #[error("interaction has already been replied to")]
    AlreadyReplied,

    /// The user does not accept direct messages from the bot.
    #[error("cannot send direct messages to user '{user_id}'")]
    DmBlocked {
        /// The user whose DMs are closed.
        user_id: String,
    },

    /// The bot lacks a permission required for the call.
    #[error("missing permission: {0}")]
    MissingPermissions(String),

    /// The referenced message or channel no longer exists.
    #[error("unknown {kind} '{id}'")]
    NotFound {
        /// Kind of object (e.g. "message", "channel").
        kind: &'static str,
        /// Identifier of the object.
        id: String,
    },

    /// Transport-level failure talking to the platform.
    #[error("platform request failed: {0}")]
    Transport(String),
}

impl PlatformError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// =============================================================================
// Response Errors
// =============================================================================

/// Errors returned by [`Response`](crate::Response) methods.
#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    /// `edit` or `del` was called before anything was sent.
    #[error("no response has been sent yet")]
    NoResponseYet,

    /// The platform rejected the call.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Result type for response operations.
pub type ResponseResult<T> = Result<T, ResponseError>;
