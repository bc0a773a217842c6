//! Route patterns.
//!
//! A route string such as `"config/set"` or `"/admin/*"` is parsed once, at
//! registration, into a [`PatternPath`] of one to three [`Segment`]s. Literal
//! segments carry their kebab-case form precomputed so that matching against
//! interaction wire names does not allocate.

use std::fmt;
use std::str::FromStr;

use courier_core::MAX_DEPTH;

use crate::error::{ConfigurationError, ConfigurationResult};

/// The wildcard segment literal.
pub const WILDCARD: &str = "*";

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches any value at this position and every position after it.
    Wildcard,
    /// Matches one name.
    Literal {
        /// The name as registered.
        name: String,
        /// The name converted to kebab-case.
        kebab: String,
    },
}

impl Segment {
    /// Creates a literal segment.
    pub fn literal(name: impl Into<String>) -> Self {
        let name = name.into();
        let kebab = to_kebab_case(&name);
        Self::Literal { name, kebab }
    }

    /// Returns `true` for the wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// The registered name of a literal segment.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Literal { name, .. } => Some(name),
            Self::Wildcard => None,
        }
    }

    /// The kebab-case name of a literal segment.
    pub fn kebab(&self) -> Option<&str> {
        match self {
            Self::Literal { kebab, .. } => Some(kebab),
            Self::Wildcard => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str(WILDCARD),
            Self::Literal { name, .. } => f.write_str(name),
        }
    }
}

/// A parsed route: one to three segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternPath {
    segments: Vec<Segment>,
}

impl PatternPath {
    /// Parses a `/`-separated route string.
    ///
    /// A single leading `/` is ignored. Empty routes, empty segments, more
    /// than three segments and segments that mix `*` with other characters
    /// are rejected.
    pub fn parse(route: &str) -> ConfigurationResult<Self> {
        let trimmed = route.strip_prefix('/').unwrap_or(route);
        if trimmed.is_empty() {
            return Err(ConfigurationError::EmptyRoute {
                route: route.to_string(),
            });
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() > MAX_DEPTH {
            return Err(ConfigurationError::TooManySegments {
                route: route.to_string(),
                count: parts.len(),
            });
        }

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() {
                return Err(ConfigurationError::EmptySegment {
                    route: route.to_string(),
                });
            }
            if part == WILDCARD {
                segments.push(Segment::Wildcard);
            } else if part.contains('*') {
                return Err(ConfigurationError::InvalidWildcard {
                    route: route.to_string(),
                    segment: part.to_string(),
                });
            } else {
                segments.push(Segment::literal(part));
            }
        }

        Ok(Self { segments })
    }

    /// The pattern that matches everything.
    pub fn wildcard() -> Self {
        Self {
            segments: vec![Segment::Wildcard],
        }
    }

    /// Number of segments (1 to 3).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; parsed patterns have at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segment at `index`, if the pattern is that long.
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// All segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if a wildcard appears at `index` or before it.
    ///
    /// A wildcard dominates every position to its right.
    pub fn is_dominated(&self, index: usize) -> bool {
        self.segments
            .iter()
            .take(index + 1)
            .any(Segment::is_wildcard)
    }
}

impl fmt::Display for PatternPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for PatternPath {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Kebab Case
// ============================================================================

/// Converts a name to kebab-case.
///
/// Word boundaries are separators (anything not alphanumeric), a lowercase
/// letter or digit followed by an uppercase letter, and the last capital of
/// an acronym followed by a lowercase letter (`"HTTPServer"` becomes
/// `"http-server"`).
pub fn to_kebab_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    let mut pending_separator = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            pending_separator = !out.is_empty();
            continue;
        }

        let boundary = c.is_uppercase()
            && i > 0
            && match chars[i - 1] {
                prev if prev.is_lowercase() || prev.is_numeric() => true,
                prev if prev.is_uppercase() => chars.get(i + 1).is_some_and(|n| n.is_lowercase()),
                _ => false,
            };

        if (boundary || pending_separator) && !out.is_empty() {
            out.push('-');
        }
        pending_separator = false;
        out.extend(c.to_lowercase());
    }

    out
}

// ============================================================================
// IntoRoutes
// ============================================================================

/// Values accepted as the route argument of a registration method.
///
/// Implemented for single routes (`&str`, `String`, [`PatternPath`]) and for
/// lists of them (arrays, slices and vectors).
pub trait IntoRoutes {
    /// Parses the routes.
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>>;
}

fn parse_all<I, S>(routes: I) -> ConfigurationResult<Vec<PatternPath>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parsed = routes
        .into_iter()
        .map(|r| PatternPath::parse(r.as_ref()))
        .collect::<ConfigurationResult<Vec<_>>>()?;
    if parsed.is_empty() {
        return Err(ConfigurationError::NoRoutes);
    }
    Ok(parsed)
}

impl IntoRoutes for &str {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        Ok(vec![PatternPath::parse(self)?])
    }
}

impl IntoRoutes for String {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        self.as_str().into_routes()
    }
}

impl IntoRoutes for &String {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        self.as_str().into_routes()
    }
}

impl IntoRoutes for PatternPath {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        Ok(vec![self])
    }
}

impl<S: AsRef<str>, const N: usize> IntoRoutes for [S; N] {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        parse_all(self)
    }
}

impl<S: AsRef<str>> IntoRoutes for &[S] {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        parse_all(self)
    }
}

impl<S: AsRef<str>> IntoRoutes for Vec<S> {
    fn into_routes(self) -> ConfigurationResult<Vec<PatternPath>> {
        parse_all(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_leading_slash() {
        let path = PatternPath::parse("/group/sub/cmd").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.get(0).and_then(Segment::name), Some("group"));
        assert_eq!(path.to_string(), "group/sub/cmd");
    }

    #[test]
    fn test_parse_wildcards() {
        let path = PatternPath::parse("cmd/*").unwrap();
        assert!(!path.is_dominated(0));
        assert!(path.is_dominated(1));
        assert!(path.is_dominated(2));
        assert!(PatternPath::parse("*").unwrap().is_dominated(2));
    }

    #[test]
    fn test_parse_rejects_bad_routes() {
        assert!(matches!(
            PatternPath::parse(""),
            Err(ConfigurationError::EmptyRoute { .. })
        ));
        assert!(matches!(
            PatternPath::parse("/"),
            Err(ConfigurationError::EmptyRoute { .. })
        ));
        assert!(matches!(
            PatternPath::parse("a//b"),
            Err(ConfigurationError::EmptySegment { .. })
        ));
        assert!(matches!(
            PatternPath::parse("a/b/c/d"),
            Err(ConfigurationError::TooManySegments { count: 4, .. })
        ));
        assert!(matches!(
            PatternPath::parse("ab*"),
            Err(ConfigurationError::InvalidWildcard { .. })
        ));
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(to_kebab_case("mySubCommand"), "my-sub-command");
        assert_eq!(to_kebab_case("MyCommand"), "my-command");
        assert_eq!(to_kebab_case("my_command"), "my-command");
        assert_eq!(to_kebab_case("already-kebab"), "already-kebab");
        assert_eq!(to_kebab_case("HTTPServer"), "http-server");
        assert_eq!(to_kebab_case("v2Api"), "v2-api");
        assert_eq!(to_kebab_case("echo"), "echo");
    }

    #[test]
    fn test_literal_precomputes_kebab() {
        let segment = Segment::literal("mySubCommandGroup");
        assert_eq!(segment.kebab(), Some("my-sub-command-group"));
        assert_eq!(segment.name(), Some("mySubCommandGroup"));
    }

    #[test]
    fn test_into_routes_variants() {
        assert_eq!("a".into_routes().unwrap().len(), 1);
        assert_eq!(["a", "b/c"].into_routes().unwrap().len(), 2);
        assert_eq!(vec!["a".to_string()].into_routes().unwrap().len(), 1);
        assert_eq!(
            Vec::<String>::new().into_routes(),
            Err(ConfigurationError::NoRoutes)
        );
        assert!(["ok", "a//b"].into_routes().is_err());
    }
}
