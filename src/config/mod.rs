pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Human-readable message placed in every `error` frame by default.
pub const DEFAULT_CHUNK_ERROR_MESSAGE: &str =
    "chat response streaming chunk parse error, please contact your API Provider to fix it.";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Whether the config file simply does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Normalization behaviour of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Fill a missing tool-call `id` with the last id seen in the same stream.
    #[serde(default = "default_true")]
    pub carry_tool_call_id: bool,
    /// Prefix of the generated correlation id used when no chunk carried one.
    #[serde(default = "default_fallback_id_prefix")]
    pub fallback_id_prefix: String,
    /// `body.message` of error frames.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

fn default_true() -> bool {
    true
}
fn default_fallback_id_prefix() -> String {
    "chunk".to_string()
}
fn default_error_message() -> String {
    DEFAULT_CHUNK_ERROR_MESSAGE.to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            carry_tool_call_id: true,
            fallback_id_prefix: default_fallback_id_prefix(),
            error_message: default_error_message(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(yaml: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}
