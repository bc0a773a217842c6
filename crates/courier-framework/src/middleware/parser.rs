//! Text command parsing for message requests.
//!
//! A message is a command if it starts with a mention of the bot (`<@ID>`,
//! `<@!ID>` or `<@&ID>`, optionally followed by one space) or with the
//! configured prefix, immediately followed by a command name made of ASCII
//! alphanumerics, `-` and `_`. The rest of the message is split like a shell
//! command line and parsed argv-style:
//!
//! ```text
//! !deploy web eu --force --tags=a b -n 3
//!
//! command    = [deploy, web, eu]
//! positional = [web, eu]
//! flags      = { force: true, tags: [a, b], n: "3" }
//! ```
//!
//! Messages that are not commands pass through unchanged, so targeted
//! entries never match them.

use std::collections::BTreeMap;

use courier_core::{Body, CommandPath, FlagValue, ParsedArgs, Request, Response};
use futures::future::{self, BoxFuture};
use tracing::trace;

use crate::error::MiddlewareError;
use crate::handler::{HandlerResult, Middleware, Next};
use crate::middleware::split::shell_split;

/// Metadata key holding the matched prefix.
pub const PREFIX_METADATA_KEY: &str = "prefix";

/// The argv-style message command parser.
#[derive(Debug, Clone, Default)]
pub struct MessageCommandParser {
    prefix: Option<String>,
}

/// Creates a parser accepting bot mentions and, if given, `prefix`.
pub fn message_command_parser(prefix: Option<&str>) -> MessageCommandParser {
    MessageCommandParser {
        prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
    }
}

/// A command recognised in message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The prefix or mention the command started with.
    pub prefix: String,
    /// The command name.
    pub name: String,
    /// The parsed arguments.
    pub args: ParsedArgs,
}

impl ParsedCommand {
    /// The command path: the name followed by up to two positional tokens.
    pub fn command_path(&self) -> CommandPath {
        let mut segments = [None, None, None];
        segments[0] = Some(self.name.clone());
        for (slot, token) in segments[1..].iter_mut().zip(&self.args.positional) {
            *slot = Some(token.clone());
        }
        CommandPath::new(segments)
    }
}

impl MessageCommandParser {
    /// The configured prefix.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Parses `content`, recognising mentions of `client_user_id`.
    pub fn parse(&self, content: &str, client_user_id: &str) -> Option<ParsedCommand> {
        let rest = strip_mention(content, client_user_id).or_else(|| {
            self.prefix
                .as_deref()
                .and_then(|prefix| content.strip_prefix(prefix))
        })?;
        let prefix = &content[..content.len() - rest.len()];

        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        if name_len == 0 {
            return None;
        }
        let (name, tail) = rest.split_at(name_len);

        Some(ParsedCommand {
            prefix: prefix.to_string(),
            name: name.to_string(),
            args: parse_args(tail),
        })
    }

    fn apply(&self, req: &Request) -> Result<(), MiddlewareError> {
        let Some(message) = req.message() else {
            return Ok(());
        };
        let client_user_id = message
            .client_user_id()
            .ok_or(MiddlewareError::MissingClientUser)?;

        match self.parse(message.content(), client_user_id) {
            Some(parsed) => {
                trace!(command = %parsed.name, prefix = %parsed.prefix, "Parsed message command");
                req.set_command(parsed.command_path());
                req.metadata()
                    .insert(PREFIX_METADATA_KEY, parsed.prefix.as_str());
                req.set_body(Body::Args(parsed.args));
            }
            None => trace!("Message is not a command"),
        }
        Ok(())
    }
}

impl Middleware for MessageCommandParser {
    fn call(&self, req: Request, _res: Response, next: Next) -> BoxFuture<'static, HandlerResult> {
        let result: HandlerResult = self.apply(&req).map_err(Into::into);
        if result.is_ok() {
            next.run();
        }
        Box::pin(future::ready(result))
    }
}

/// Strips a leading mention of `client_user_id`, returning the remainder.
fn strip_mention<'a>(content: &'a str, client_user_id: &str) -> Option<&'a str> {
    let rest = content.strip_prefix("<@")?;
    let rest = rest
        .strip_prefix(['!', '&'])
        .unwrap_or(rest)
        .strip_prefix(client_user_id)?
        .strip_prefix('>')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parses argv-style arguments.
///
/// Tokens before the first dash-prefixed token are positional. Each `-x` or
/// `--x` starts a flag collecting the tokens after it; `--x=a b` seeds the
/// flag with `a` and `b`.
pub fn parse_args(input: &str) -> ParsedArgs {
    let mut tokens = shell_split(input).into_iter().peekable();

    let mut positional = Vec::new();
    while let Some(token) = tokens.next_if(|t| !t.starts_with('-')) {
        positional.push(token);
    }

    let mut flags = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;
    for token in tokens {
        if !token.starts_with('-') {
            if let Some((_, values)) = current.as_mut() {
                values.push(token);
            }
            continue;
        }

        if let Some((name, values)) = current.take() {
            flags.insert(name, FlagValue::from_values(values));
        }

        let stripped = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
            .unwrap_or(&token);
        let (name, values) = match stripped.split_once('=') {
            Some((name, value)) if !name.is_empty() => (
                name,
                value
                    .split(' ')
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => (stripped, Vec::new()),
        };
        if !name.is_empty() {
            current = Some((name.to_string(), values));
        }
    }

    if let Some((name, values)) = current {
        flags.insert(name, FlagValue::from_values(values));
    }

    ParsedArgs { positional, flags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::test_util::{MockInteraction, MockMessage};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_positional_and_flags() {
        let args = parse_args(" a b c d --flag");
        assert_eq!(args.positional, strings(&["a", "b", "c", "d"]));
        assert_eq!(args.flag("flag"), Some(&FlagValue::Bool(true)));
    }

    #[test]
    fn test_parse_args_flag_values() {
        let args = parse_args(" -flag a b c d --option=10");
        assert!(args.positional.is_empty());
        assert_eq!(
            args.flag("flag"),
            Some(&FlagValue::Many(strings(&["a", "b", "c", "d"])))
        );
        assert_eq!(args.flag("option").and_then(FlagValue::as_str), Some("10"));
    }

    #[test]
    fn test_parse_args_equals_with_spaces() {
        let args = parse_args(r#" --tags="x y" z"#);
        assert_eq!(
            args.flag("tags"),
            Some(&FlagValue::Many(strings(&["x", "y", "z"])))
        );
    }

    #[test]
    fn test_parse_prefix_and_mentions() {
        let parser = message_command_parser(Some("!"));

        let parsed = parser.parse("!ping", "bot-1").unwrap();
        assert_eq!(parsed.prefix, "!");
        assert_eq!(parsed.name, "ping");

        for content in ["<@bot-1>ping", "<@bot-1> ping", "<@!bot-1> ping", "<@&bot-1>ping"] {
            let parsed = parser.parse(content, "bot-1").unwrap();
            assert_eq!(parsed.name, "ping", "content: {content}");
            assert!(parsed.prefix.starts_with("<@"));
        }

        assert!(parser.parse("<@someone-else> ping", "bot-1").is_none());
        assert!(parser.parse("ping", "bot-1").is_none());
        assert!(parser.parse("! ping", "bot-1").is_none());
    }

    #[test]
    fn test_parse_without_prefix_only_accepts_mentions() {
        let parser = message_command_parser(None);
        assert!(parser.parse("!ping", "bot-1").is_none());
        assert!(parser.parse("<@bot-1> ping", "bot-1").is_some());
    }

    #[test]
    fn test_command_path_takes_two_positionals() {
        let parsed = message_command_parser(Some("!"))
            .parse("!config set color red", "bot-1")
            .unwrap();
        assert_eq!(
            parsed.command_path(),
            CommandPath::from_segments(["config", "set", "color"])
        );
        assert_eq!(parsed.args.positional, strings(&["set", "color", "red"]));
    }

    #[tokio::test]
    async fn test_middleware_sets_body_command_and_prefix() {
        let req = Request::new(MockMessage::new("!echo 1 2 3").into_trigger());
        let res = Response::new(req.trigger());
        let (next, rx) = Next::channel();

        message_command_parser(Some("!"))
            .call(req.clone(), res, next)
            .await
            .unwrap();

        assert!(rx.await.is_ok());
        assert_eq!(req.command(), CommandPath::from_segments(["echo", "1", "2"]));
        assert_eq!(req.body().positional(), Some(&strings(&["1", "2", "3"])[..]));
        assert_eq!(req.metadata().get_str(PREFIX_METADATA_KEY), Some("!"));
    }

    #[tokio::test]
    async fn test_middleware_leaves_plain_messages_alone() {
        let req = Request::new(MockMessage::new("just chatting").into_trigger());
        let res = Response::new(req.trigger());
        let (next, rx) = Next::channel();

        message_command_parser(Some("!"))
            .call(req.clone(), res, next)
            .await
            .unwrap();

        assert!(rx.await.is_ok());
        assert!(req.command().is_empty());
        assert_eq!(req.body().as_text(), Some("just chatting"));
    }

    #[tokio::test]
    async fn test_middleware_requires_client_user() {
        let req = Request::new(
            MockMessage::new("!ping")
                .client_user(None)
                .into_trigger(),
        );
        let res = Response::new(req.trigger());
        let (next, _rx) = Next::channel();

        let err = message_command_parser(Some("!"))
            .call(req, res, next)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "client user id is not available");
    }

    #[tokio::test]
    async fn test_middleware_skips_interactions() {
        let req = Request::new(MockInteraction::new("ping").into_trigger());
        let res = Response::new(req.trigger());
        let (next, rx) = Next::channel();

        message_command_parser(Some("!"))
            .call(req.clone(), res, next)
            .await
            .unwrap();

        assert!(rx.await.is_ok());
        assert_eq!(req.command(), CommandPath::from_segments(["ping"]));
    }
}
