//! Request payloads and the metadata bag.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The payload of a request.
///
/// Message requests start out as [`Body::Text`] and are replaced by
/// [`Body::Args`] once a parsing middleware has run. Interaction requests
/// carry their resolved options as [`Body::Options`] from the start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    /// Raw message content, not yet parsed.
    Text(String),
    /// Argv-style parsed message arguments.
    Args(ParsedArgs),
    /// Interaction options, name to value.
    Options(Map<String, Value>),
}

impl Default for Body {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Body {
    /// Returns the raw text for unparsed message bodies.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the parsed arguments of a message body.
    pub fn as_args(&self) -> Option<&ParsedArgs> {
        match self {
            Self::Args(args) => Some(args),
            _ => None,
        }
    }

    /// Mutable access to parsed message arguments.
    pub fn as_args_mut(&mut self) -> Option<&mut ParsedArgs> {
        match self {
            Self::Args(args) => Some(args),
            _ => None,
        }
    }

    /// Returns the option map of an interaction body.
    pub fn as_options(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Options(options) => Some(options),
            _ => None,
        }
    }

    /// Positional arguments, if the body has been parsed.
    pub fn positional(&self) -> Option<&[String]> {
        self.as_args().map(|args| args.positional.as_slice())
    }

    /// Looks up an interaction option by name.
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.as_options().and_then(|options| options.get(name))
    }
}

/// Value of a parsed flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Flag given without values.
    Bool(bool),
    /// Flag followed by exactly one value.
    Single(String),
    /// Flag followed by several values.
    Many(Vec<String>),
}

impl FlagValue {
    /// Builds a flag value from the tokens that followed it.
    pub fn from_values(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => Self::Bool(true),
            1 => Self::Single(values.remove(0)),
            _ => Self::Many(values),
        }
    }

    /// Returns the single value, if there is exactly one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }
}

/// Argv-style arguments parsed from a text command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArgs {
    /// Positional tokens preceding the first flag.
    #[serde(rename = "_")]
    pub positional: Vec<String>,
    /// Flags keyed by name without leading dashes.
    #[serde(flatten)]
    pub flags: BTreeMap<String, FlagValue>,
}

impl ParsedArgs {
    /// Returns a flag by name.
    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Returns `true` if the flag was given.
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }
}

/// Open key-value bag shared by every middleware of one dispatch run.
///
/// Values are stored as JSON so that independent middleware can exchange
/// structured data (e.g. the rate-limit state) without sharing types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw JSON value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Serializes and stores a value.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<()> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value for `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserializes the value for `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_value_from_values() {
        assert_eq!(FlagValue::from_values(vec![]), FlagValue::Bool(true));
        assert_eq!(
            FlagValue::from_values(vec!["a".into()]),
            FlagValue::Single("a".into())
        );
        assert_eq!(
            FlagValue::from_values(vec!["a".into(), "b".into()]),
            FlagValue::Many(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_parsed_args_serializes_like_argv_object() {
        let mut args = ParsedArgs {
            positional: vec!["1".into(), "2".into()],
            ..Default::default()
        };
        args.flags.insert("flag".into(), FlagValue::Bool(true));

        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({"_": ["1", "2"], "flag": true})
        );
    }

    #[test]
    fn test_metadata_round_trips_structured_values() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Limit {
            remaining: u32,
        }

        let mut meta = Metadata::new();
        meta.insert("prefix", "!");
        meta.insert_serialized("rateLimit", &Limit { remaining: 3 })
            .unwrap();

        assert_eq!(meta.get_str("prefix"), Some("!"));
        assert_eq!(
            meta.get_as::<Limit>("rateLimit"),
            Some(Limit { remaining: 3 })
        );
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn test_body_accessors() {
        let body = Body::Options(Map::from_iter([("count".to_string(), json!(3))]));
        assert_eq!(body.option("count"), Some(&json!(3)));
        assert!(body.positional().is_none());
        assert!(Body::default().as_text().is_some());
    }
}
