//! Access logging.
//!
//! The logger renders one line per request from a template of `:token`
//! placeholders and emits it at `info` level with target `courier::access`.
//!
//! | Token            | Value                                              |
//! |------------------|----------------------------------------------------|
//! | `:username`      | user name                                          |
//! | `:discriminator` | user discriminator                                 |
//! | `:userId`        | user id                                            |
//! | `:type`          | `message` or `interaction`                         |
//! | `:startAt`       | when the request was built (web date)              |
//! | `:date`          | now (web date)                                     |
//! | `:guild`         | guild name, or `DM-{user#tag}`                     |
//! | `:guildId`       | guild id, or `DM-{user id}`                        |
//! | `:channel`       | channel name                                       |
//! | `:channelId`     | channel id, or `DM-{user id}`                      |
//! | `:command`       | the command path, `/`-joined                       |
//! | `:prefix`        | the parsed prefix, `/` for interactions            |
//!
//! Unknown tokens are left as written.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use courier_core::{Request, Response};
use tracing::info;

use crate::handler::{Middleware, Next};
use crate::middleware::parser::PREFIX_METADATA_KEY;

/// Target of every access log event.
pub const ACCESS_TARGET: &str = "courier::access";

/// `:prefix:command`
pub const TINY: &str = ":prefix:command";
/// `:username#:discriminator :prefix:command`
pub const SHORT: &str = ":username#:discriminator :prefix:command";
/// Date, user, location, type and command.
pub const COMBINED: &str =
    r#":startAt - :username#:discriminator | :guild | :channel - :type ":prefix:command""#;

/// How dates are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// Common log format: `01/Jan/2024:00:00:00 +0000`.
    Clf,
    /// ISO 8601: `2024-01-01T00:00:00.000Z`.
    Iso,
    /// HTTP date: `Mon, 01 Jan 2024 00:00:00 GMT`.
    #[default]
    Web,
}

/// Renders `date` in the given format.
pub fn format_date(date: DateTime<Utc>, format: DateFormat) -> String {
    match format {
        DateFormat::Clf => date.format("%d/%b/%Y:%H:%M:%S +0000").to_string(),
        DateFormat::Iso => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        DateFormat::Web => date.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    }
}

/// Builds a line from the request and response; the result is expanded
/// like a template.
pub type FormatFn = Arc<dyn Fn(&Request, &Response) -> String + Send + Sync>;

/// The line format.
#[derive(Clone, Default)]
pub enum LogFormat {
    /// [`TINY`]
    Tiny,
    /// [`SHORT`]
    Short,
    /// [`COMBINED`]
    #[default]
    Combined,
    /// A custom template.
    Template(String),
    /// A custom function.
    Custom(FormatFn),
}

impl LogFormat {
    /// Resolves a preset name, or treats `format` as a template.
    pub fn parse(format: &str) -> Self {
        match format {
            "tiny" => Self::Tiny,
            "short" => Self::Short,
            "combined" => Self::Combined,
            other => Self::Template(other.to_string()),
        }
    }

    /// Uses a custom function.
    pub fn custom(f: impl Fn(&Request, &Response) -> String + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    fn render(&self, req: &Request, res: &Response) -> String {
        match self {
            Self::Tiny => format_line(req, TINY),
            Self::Short => format_line(req, SHORT),
            Self::Combined => format_line(req, COMBINED),
            Self::Template(template) => format_line(req, template),
            Self::Custom(f) => format_line(req, &f(req, res)),
        }
    }
}

impl fmt::Debug for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tiny => f.write_str("Tiny"),
            Self::Short => f.write_str("Short"),
            Self::Combined => f.write_str("Combined"),
            Self::Template(t) => f.debug_tuple("Template").field(t).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for LogFormat {
    fn from(format: &str) -> Self {
        Self::parse(format)
    }
}

/// Returns the value of `token` for `req`, or `None` for unknown tokens.
pub fn token(req: &Request, token: &str) -> Option<String> {
    let user = req.user();
    let tag = user.tag();
    let value = match token {
        "username" => user.username.clone(),
        "discriminator" => user.discriminator.clone(),
        "userId" => user.id.clone(),
        "type" => req.request_type().to_string(),
        "startAt" => format_date(req.start_at(), DateFormat::Web),
        "date" => format_date(Utc::now(), DateFormat::Web),
        "guild" => req
            .guild()
            .map_or_else(|| format!("DM-{tag}"), |guild| guild.name.clone()),
        "guildId" => req
            .guild_id()
            .map_or_else(|| format!("DM-{}", user.id), str::to_string),
        "channel" => match req.channel_id() {
            Some(_) => req
                .channel()
                .and_then(|channel| channel.name.clone())
                .unwrap_or_else(|| format!("NOT-FOUND-{tag}")),
            None => format!("DM-{tag}"),
        },
        "channelId" => req
            .channel_id()
            .map_or_else(|| format!("DM-{}", user.id), str::to_string),
        "command" => req.command().to_string(),
        "prefix" => req
            .metadata()
            .get_str(PREFIX_METADATA_KEY)
            .unwrap_or("/")
            .to_string(),
        _ => return None,
    };
    Some(value)
}

/// Expands every `:token` in `template`.
pub fn format_line(req: &Request, template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        let name = &after[..len];

        match token(req, name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push(':');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

/// Creates an access logger.
pub fn logger(format: impl Into<LogFormat>) -> impl Middleware + Clone {
    let format = format.into();
    move |req: Request, res: Response, next: Next| {
        let line = format.render(&req, &res);
        info!(target: ACCESS_TARGET, "{line}");
        next.run();
        std::future::ready(())
    }
}
