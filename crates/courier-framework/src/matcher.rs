//! Command-path matching.
//!
//! Matching is a pure function of the pattern and the request's paths:
//! [`resolve_command_path`] returns a [`MatchOutcome`] describing the command
//! path the request should carry afterwards and how deep the pattern claimed
//! it. [`matches`] applies that outcome to a [`Request`].
//!
//! # Rules
//!
//! A wildcard dominates every position to its right: `"*"` matches any
//! path, `"cmd/*"` matches `cmd` with any group and subcommand.
//!
//! **Interactions** compare all three positions; positions the pattern does
//! not name must be absent from the command. A literal matches the current
//! segment directly, or matches the wire segment exactly or after kebab-case
//! conversion. The latter two rewrite the segment to the registered casing.
//!
//! **Messages** compare only as many positions as the pattern has. A match
//! of depth `n` claims the first `n - 1` positional arguments as path
//! segments; they are shifted off the body once, no matter how many entries
//! match at that depth.
//!
//! | Pattern        | Command               | Interaction | Message |
//! |----------------|-----------------------|-------------|---------|
//! | `*`            | `[a, b, c]`           | yes         | yes     |
//! | `cmd`          | `[cmd, sub, -]`       | no          | yes     |
//! | `cmd/*`        | `[cmd, x, y]`         | yes         | yes     |
//! | `myCmd`        | `[my-cmd, -, -]`      | yes         | no      |

use courier_core::{CommandPath, MAX_DEPTH, Request, RequestType};

use crate::route::{PatternPath, Segment};

/// How a pattern is compared against a command path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Command semantics: interactions compare every position, messages
    /// compare the pattern's length and shift positional arguments.
    Command,
    /// Mount semantics: only the pattern's own positions are compared and
    /// nothing is shifted.
    Prefix,
}

/// The result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// The command path after case reconciliation.
    pub command: CommandPath,
    /// Path depth claimed for positional-argument shifting; `0` for none.
    pub consume: usize,
}

enum Position {
    Mismatch,
    Match,
    Rewrite(String),
}

fn compare(
    pattern: &PatternPath,
    index: usize,
    current: Option<&str>,
    wire: Option<&str>,
    reconcile: bool,
) -> Position {
    if pattern.is_dominated(index) {
        return Position::Match;
    }

    match pattern.get(index) {
        None | Some(Segment::Wildcard) => {
            if current.is_none() {
                Position::Match
            } else {
                Position::Mismatch
            }
        }
        Some(Segment::Literal { name, kebab }) => {
            if current == Some(name.as_str()) {
                Position::Match
            } else if reconcile && (wire == Some(name.as_str()) || wire == Some(kebab.as_str())) {
                Position::Rewrite(name.clone())
            } else {
                Position::Mismatch
            }
        }
    }
}

/// Resolves `pattern` against a request's command paths.
///
/// `current` is the command path as the request carries it now; `wire` is
/// the path the platform delivered, used for case reconciliation of
/// interactions. Returns `None` if the pattern does not match.
pub fn resolve_command_path(
    pattern: &PatternPath,
    request_type: RequestType,
    current: &CommandPath,
    wire: &CommandPath,
    mode: MatchMode,
) -> Option<MatchOutcome> {
    // A message nobody parsed has no command and is never a target.
    current.name()?;

    let reconcile = request_type == RequestType::Interaction;
    let positions = match (request_type, mode) {
        (RequestType::Interaction, MatchMode::Command) => MAX_DEPTH,
        _ => pattern.len(),
    };

    let mut command = current.clone();
    for index in 0..positions {
        match compare(pattern, index, current.get(index), wire.get(index), reconcile) {
            Position::Mismatch => return None,
            Position::Match => {}
            Position::Rewrite(name) => command.set(index, Some(name)),
        }
    }

    let consume = match (request_type, mode) {
        (RequestType::Message, MatchMode::Command) => pattern.len(),
        _ => 0,
    };

    Some(MatchOutcome { command, consume })
}

/// Matches `pattern` against `request`, applying the outcome on success.
///
/// On a match the request's command path is replaced with the reconciled
/// one and positional arguments are shifted as described in the module
/// documentation.
pub fn matches(pattern: &PatternPath, request: &Request, mode: MatchMode) -> bool {
    let outcome = resolve_command_path(
        pattern,
        request.request_type(),
        &request.command(),
        request.wire_command(),
        mode,
    );

    match outcome {
        Some(outcome) => {
            request.set_command(outcome.command);
            if outcome.consume > 0 {
                request.consume_path(outcome.consume);
            }
            true
        }
        None => false,
    }
}

/// Returns the first pattern in `patterns` that matches, applying its
/// outcome.
pub fn first_match<'a>(
    patterns: &'a [PatternPath],
    request: &Request,
    mode: MatchMode,
) -> Option<&'a PatternPath> {
    patterns
        .iter()
        .find(|pattern| matches(pattern, request, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::test_util::{MockInteraction, MockMessage};
    use courier_core::{Body, ParsedArgs};

    fn path(segments: &[&str]) -> CommandPath {
        CommandPath::from_segments(segments.iter().copied())
    }

    fn pattern(route: &str) -> PatternPath {
        PatternPath::parse(route).unwrap()
    }

    fn resolve(route: &str, ty: RequestType, cmd: &[&str]) -> Option<MatchOutcome> {
        let cmd = path(cmd);
        resolve_command_path(&pattern(route), ty, &cmd, &cmd, MatchMode::Command)
    }

    fn parsed_message(command: &[&str], positional: &[&str]) -> Request {
        let req = Request::new(MockMessage::new("!").into_trigger());
        req.set_command(path(command));
        req.set_body(Body::Args(ParsedArgs {
            positional: positional.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }));
        req
    }

    #[test]
    fn test_wildcard_dominance() {
        for ty in [RequestType::Message, RequestType::Interaction] {
            assert!(resolve("*", ty, &["a"]).is_some());
            assert!(resolve("*", ty, &["a", "b"]).is_some());
            assert!(resolve("*", ty, &["a", "b", "c"]).is_some());
            assert!(resolve("cmd/*", ty, &["cmd", "x", "y"]).is_some());
            assert!(resolve("cmd/*", ty, &["other", "x", "y"]).is_none());
        }
    }

    #[test]
    fn test_interaction_compares_every_position() {
        let ty = RequestType::Interaction;
        assert!(resolve("cmd", ty, &["cmd"]).is_some());
        assert!(resolve("cmd", ty, &["cmd", "sub"]).is_none());
        assert!(resolve("cmd/sub", ty, &["cmd"]).is_none());
        assert!(resolve("cmd/sub", ty, &["cmd", "sub"]).is_some());
        assert!(resolve("a/b/*", ty, &["a", "b", "c"]).is_some());
    }

    #[test]
    fn test_message_compares_pattern_length() {
        let ty = RequestType::Message;
        assert_eq!(resolve("cmd", ty, &["cmd", "x", "y"]).map(|o| o.consume), Some(1));
        assert_eq!(resolve("cmd/x", ty, &["cmd", "x", "y"]).map(|o| o.consume), Some(2));
        assert_eq!(resolve("cmd/x/y", ty, &["cmd", "x", "y"]).map(|o| o.consume), Some(3));
        assert!(resolve("cmd/z", ty, &["cmd", "x", "y"]).is_none());
    }

    #[test]
    fn test_message_is_not_reconciled() {
        assert!(resolve("myCmd", RequestType::Message, &["my-cmd"]).is_none());
    }

    #[test]
    fn test_unparsed_message_never_matches() {
        let empty = CommandPath::empty();
        let outcome = resolve_command_path(
            &pattern("*"),
            RequestType::Message,
            &empty,
            &empty,
            MatchMode::Command,
        );
        assert!(outcome.is_none());
    }

    #[test]
    fn test_case_reconciliation_rewrites_to_registered_casing() {
        let req = Request::new(
            MockInteraction::new("my-sub-command")
                .subcommand("my-command")
                .into_trigger(),
        );

        assert!(matches(&pattern("mySubCommand/myCommand"), &req, MatchMode::Command));
        assert_eq!(req.command(), path(&["mySubCommand", "myCommand"]));

        // Second pass with the same pattern matches directly, no rewrite.
        assert!(matches(&pattern("mySubCommand/myCommand"), &req, MatchMode::Command));
        assert_eq!(req.command(), path(&["mySubCommand", "myCommand"]));

        // A kebab-case pattern still matches after the rewrite.
        assert!(matches(&pattern("my-sub-command/my-command"), &req, MatchMode::Command));
        assert_eq!(req.wire_command(), &path(&["my-sub-command", "my-command"]));
    }

    #[test]
    fn test_three_level_round_trip() {
        let req = Request::new(
            MockInteraction::new("my-sub-command-group")
                .group("my-sub-command")
                .subcommand("my-command")
                .into_trigger(),
        );

        assert!(matches(
            &pattern("mySubCommandGroup/mySubCommand/myCommand"),
            &req,
            MatchMode::Command
        ));
        assert_eq!(
            req.command(),
            path(&["mySubCommandGroup", "mySubCommand", "myCommand"])
        );
    }

    #[test]
    fn test_failed_match_leaves_request_untouched() {
        let req = Request::new(
            MockInteraction::new("my-cmd")
                .subcommand("other")
                .into_trigger(),
        );
        assert!(!matches(&pattern("myCmd/sub"), &req, MatchMode::Command));
        assert_eq!(req.command(), path(&["my-cmd", "other"]));
    }

    #[test]
    fn test_positional_shift_by_depth() {
        let req = parsed_message(&["cmd", "x", "y"], &["x", "y", "z"]);
        assert!(matches(&pattern("cmd/x"), &req, MatchMode::Command));
        assert_eq!(req.body().positional().map(<[String]>::len), Some(2));

        let req = parsed_message(&["cmd", "x", "y"], &["x", "y", "z"]);
        assert!(matches(&pattern("cmd/x/y"), &req, MatchMode::Command));
        assert_eq!(
            req.body().positional(),
            Some(&["z".to_string()][..])
        );

        let req = parsed_message(&["echo", "1", "2"], &["1", "2", "3"]);
        assert!(matches(&pattern("echo"), &req, MatchMode::Command));
        assert_eq!(req.body().positional().map(<[String]>::len), Some(3));
    }

    #[test]
    fn test_prefix_mode_matches_mount_points() {
        let req = Request::new(
            MockInteraction::new("admin")
                .group("users")
                .subcommand("ban")
                .into_trigger(),
        );
        assert!(matches(&pattern("admin"), &req, MatchMode::Prefix));
        assert!(matches(&pattern("admin/users"), &req, MatchMode::Prefix));
        assert!(!matches(&pattern("admin/roles"), &req, MatchMode::Prefix));

        let req = parsed_message(&["admin", "users"], &["users"]);
        assert!(matches(&pattern("admin/users"), &req, MatchMode::Prefix));
        assert_eq!(req.body().positional().map(<[String]>::len), Some(1));
    }

    #[test]
    fn test_first_match_stops_at_first_pattern() {
        let req = parsed_message(&["b"], &[]);
        let patterns = vec![pattern("a"), pattern("b"), pattern("*")];
        let hit = first_match(&patterns, &req, MatchMode::Command);
        assert_eq!(hit.map(ToString::to_string), Some("b".to_string()));
    }
}
