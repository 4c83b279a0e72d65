use crate::config::ConfigError;

/// Process-level error type used by the CLI and stream setup.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structural failure while classifying one raw chunk.
///
/// These never cross the stream boundary; the recovery wrapper turns each one
/// into a single `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("chunk has no `choices` array")]
    MissingChoices,
    #[error("choice at position {position} must be an object, found {found}")]
    InvalidChoice {
        position: usize,
        found: &'static str,
    },
    #[error("`delta` must be an object or null, found {found}")]
    InvalidDelta { found: &'static str },
    #[error("`finish_reason` must be a string or null, found {found}")]
    InvalidFinishReason { found: &'static str },
    #[error("`tool_calls` could not be read: {0}")]
    InvalidToolCalls(String),
}

impl ChunkError {
    /// Stable, machine-checkable kind tag carried in error frames.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ChunkError::NotAnObject { .. } => "NotAnObject",
            ChunkError::MissingChoices => "MissingChoices",
            ChunkError::InvalidChoice { .. } => "InvalidChoice",
            ChunkError::InvalidDelta { .. } => "InvalidDelta",
            ChunkError::InvalidFinishReason { .. } => "InvalidFinishReason",
            ChunkError::InvalidToolCalls(_) => "InvalidToolCalls",
        }
    }
}

/// Short name of a JSON value's type, used in error messages.
#[must_use]
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
