//! Configuration validation utilities.

use courier_framework::middleware::RateLimitBy;

use super::error::{ConfigError, ConfigResult};
use super::schema::{CommandsConfig, CourierConfig, LogOutput, LoggingConfig, RateLimitConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_commands_config(&config.commands)?;
    if let Some(rate_limit) = &config.rate_limit {
        validate_rate_limit_config(rate_limit)?;
    }
    Ok(())
}

fn validate_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_level(&logging.level)?;

    for (target, level) in &logging.filters {
        if target.is_empty() {
            return Err(ConfigError::validation("Log filter target cannot be empty"));
        }
        validate_level(level)?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }

    Ok(())
}

/// Validates the default middleware settings.
fn validate_commands_config(commands: &CommandsConfig) -> ConfigResult<()> {
    if let Some(prefix) = &commands.prefix {
        if prefix.is_empty() {
            return Err(ConfigError::validation("Command prefix cannot be empty"));
        }
        if prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(
                "Command prefix cannot contain whitespace",
            ));
        }
    }
    Ok(())
}

/// Validates rate limiting settings.
fn validate_rate_limit_config(rate_limit: &RateLimitConfig) -> ConfigResult<()> {
    if RateLimitBy::from_name(&rate_limit.rate_limit_by).is_none() {
        return Err(ConfigError::validation(format!(
            "Invalid rate limit method: {}. Valid values are: user, channel, guild, guildUser, channelUser",
            rate_limit.rate_limit_by
        )));
    }

    if rate_limit.window_ms == 0 {
        return Err(ConfigError::validation(
            "Rate limit window must be greater than 0",
        ));
    }

    if rate_limit.max == 0 {
        return Err(ConfigError::validation(
            "Rate limit max must be greater than 0",
        ));
    }

    if rate_limit.meta_property_name.is_empty() {
        return Err(ConfigError::validation(
            "Rate limit meta property name cannot be empty",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = CourierConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = CourierConfig::default();
        config
            .logging
            .filters
            .insert("courier::access".to_string(), "loud".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_prefix() {
        let mut config = CourierConfig::default();
        config.commands.prefix = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.commands.prefix = Some("! ".to_string());
        assert!(validate_config(&config).is_err());

        config.commands.prefix = Some("!".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rate_limit() {
        let mut config = CourierConfig {
            rate_limit: Some(RateLimitConfig::default()),
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        if let Some(rate_limit) = config.rate_limit.as_mut() {
            rate_limit.window_ms = 0;
        }
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.rate_limit = Some(RateLimitConfig {
            max: 0,
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.rate_limit = Some(RateLimitConfig {
            rate_limit_by: "planet".to_string(),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
