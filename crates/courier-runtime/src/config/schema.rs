//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Settings for the default middleware set.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Rate limiting; disabled when absent.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line with span context.
    Full,
    /// Multi-line, human-oriented.
    Pretty,
    /// Newline-delimited JSON (requires the `json-log` feature).
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A file, see [`LoggingConfig::file_path`].
    File,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log when each `dispatch` span opens and closes, with its timings.
    #[serde(default)]
    pub dispatch_spans: bool,

    /// Write access log lines bare, without timestamp, level or target.
    #[serde(default = "default_true")]
    pub plain_access_log: bool,

    /// Log file path for file output.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `courier::access = "warn"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            dispatch_spans: false,
            plain_access_log: true,
            file_path: None,
            filters: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Commands
// =============================================================================

/// Guild and user ids the bot ignores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistConfig {
    /// Blocked guild ids.
    #[serde(default)]
    pub guilds: Vec<String>,
    /// Blocked user ids.
    #[serde(default)]
    pub users: Vec<String>,
}

impl BlacklistConfig {
    /// Returns `true` if nothing is blocked.
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty() && self.users.is_empty()
    }
}

/// Settings for the default middleware set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Text command prefix on top of bot mentions.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Accept requests from bot accounts.
    #[serde(default)]
    pub allow_bots: bool,

    /// Accept requests from direct messages.
    #[serde(default)]
    pub allow_dms: bool,

    /// Accept messages posted by webhooks.
    #[serde(default)]
    pub allow_webhooks: bool,

    /// Ignored guilds and users.
    #[serde(default)]
    pub blacklist: BlacklistConfig,

    /// Access log format (`tiny`, `short`, `combined` or a template);
    /// disabled when absent.
    #[serde(default)]
    pub access_log: Option<String>,
}

// =============================================================================
// Rate Limit
// =============================================================================

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Counter key: user, channel, guild, guildUser or channelUser.
    #[serde(default = "default_rate_limit_by")]
    pub rate_limit_by: String,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per window.
    #[serde(default = "default_max")]
    pub max: u64,

    /// Reply sent to limited requesters.
    #[serde(default = "default_message")]
    pub message: String,

    /// Metadata key the limiter state is written to.
    #[serde(default = "default_meta_property_name")]
    pub meta_property_name: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_limit_by: default_rate_limit_by(),
            window_ms: default_window_ms(),
            max: default_max(),
            message: default_message(),
            meta_property_name: default_meta_property_name(),
        }
    }
}

fn default_rate_limit_by() -> String {
    "user".to_string()
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max() -> u64 {
    5
}

fn default_message() -> String {
    courier_framework::middleware::rate_limit::DEFAULT_MESSAGE.to_string()
}

fn default_meta_property_name() -> String {
    courier_framework::middleware::rate_limit::DEFAULT_META_PROPERTY.to_string()
}
