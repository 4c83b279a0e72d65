use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_stream_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_stream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let stream = &config.stream;
    if stream.fallback_id_prefix.is_empty() {
        return Err(validation_err("stream.fallback_id_prefix cannot be empty"));
    }
    if stream.fallback_id_prefix.chars().any(char::is_whitespace) {
        return Err(validation_err(
            "stream.fallback_id_prefix cannot contain whitespace",
        ));
    }
    if stream.error_message.trim().is_empty() {
        return Err(validation_err("stream.error_message cannot be empty"));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level must be one of {VALID_LOG_LEVELS:?}, got '{}'",
            config.features.log_level
        )));
    }
    Ok(())
}
