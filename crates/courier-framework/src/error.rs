//! Error types for the Courier framework.

use std::borrow::Cow;

use thiserror::Error;

pub use tower::BoxError;

/// Registration-time errors.
///
/// These are raised synchronously by the [`Router`](crate::Router)
/// registration methods and never at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A registration method was called without handlers.
    #[error("at least one handler is required")]
    NoHandlers,

    /// A registration method was called with an empty route list.
    #[error("at least one route is required")]
    NoRoutes,

    /// A route resolved to no segments.
    #[error("route '{route}' is empty")]
    EmptyRoute {
        /// The offending route string.
        route: String,
    },

    /// A route contains an empty segment, e.g. `"a//b"`.
    #[error("route '{route}' contains an empty segment")]
    EmptySegment {
        /// The offending route string.
        route: String,
    },

    /// A route has more than three segments.
    #[error("route '{route}' has {count} segments, at most 3 are allowed")]
    TooManySegments {
        /// The offending route string.
        route: String,
        /// Number of segments found.
        count: usize,
    },

    /// A segment mixes the wildcard with other characters, e.g. `"ab*"`.
    #[error("route '{route}' has invalid wildcard segment '{segment}'")]
    InvalidWildcard {
        /// The offending route string.
        route: String,
        /// The offending segment.
        segment: String,
    },
}

/// Result type for registration.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// A handler panicked instead of returning.
///
/// The engine catches the panic and treats it like any other handler error.
#[derive(Debug, Clone, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanicked {
    /// The panic payload, if it was a string.
    pub message: Cow<'static, str>,
}

impl HandlerPanicked {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<&'static str>() {
            Ok(s) => Cow::Borrowed(*s),
            Err(payload) => match payload.downcast::<String>() {
                Ok(s) => Cow::Owned(*s),
                Err(_) => Cow::Borrowed("non-string panic payload"),
            },
        };
        Self { message }
    }
}

/// Errors raised by the built-in middleware.
#[derive(Debug, Clone, Error)]
pub enum MiddlewareError {
    /// The platform client has no user yet, so mentions cannot be parsed.
    #[error("client user id is not available")]
    MissingClientUser,

    /// A rate-limit store failed.
    #[error("rate limit store error: {0}")]
    Store(String),
}

impl MiddlewareError {
    /// Creates a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_message() {
        let err = HandlerPanicked::from_payload(Box::new("boom"));
        assert_eq!(err.message, "boom");

        let err = HandlerPanicked::from_payload(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "handler panicked: owned boom");

        let err = HandlerPanicked::from_payload(Box::new(42_u8));
        assert_eq!(err.message, "non-string panic payload");
    }
}
