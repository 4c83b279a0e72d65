use serde::{Deserialize, Serialize};
use std::fmt;

pub type ProviderExtensions = serde_json::Map<String, serde_json::Value>;

/// The kind of a canonical frame, written on the `event:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEvent {
    Text,
    ToolCalls,
    Stop,
    Data,
    Error,
}

impl FrameEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FrameEvent::Text => "text",
            FrameEvent::ToolCalls => "tool_calls",
            FrameEvent::Stop => "stop",
            FrameEvent::Data => "data",
            FrameEvent::Error => "error",
        }
    }

    /// Whether the frame carries model output (as opposed to control frames).
    #[must_use]
    pub fn is_content(self) -> bool {
        matches!(
            self,
            FrameEvent::Text | FrameEvent::ToolCalls | FrameEvent::Data
        )
    }
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event in the canonical output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFrame {
    pub id: String,
    pub event: FrameEvent,
    pub data: serde_json::Value,
}

impl CanonicalFrame {
    #[must_use]
    pub fn new(id: impl Into<String>, event: FrameEvent, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            event,
            data,
        }
    }
}

/// Function part of a tool-call fragment. Both fields may be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(flatten)]
    pub extra: ProviderExtensions,
}

/// One partial tool-call descriptor inside a single chunk's `tool_calls` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: ProviderExtensions,
}

impl ToolCallFragment {
    /// Argument text carried by this fragment, empty when absent.
    #[must_use]
    pub fn arguments(&self) -> &str {
        self.function
            .as_ref()
            .and_then(|f| f.arguments.as_deref())
            .unwrap_or_default()
    }
}

/// Token usage reported upstream or estimated locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl CanonicalUsage {
    /// Read an OpenAI-style `usage` object. Unknown or non-numeric fields are ignored.
    #[must_use]
    pub fn from_openai_value(value: &serde_json::Value) -> Self {
        let field = |name: &str| value.get(name).and_then(serde_json::Value::as_u64);
        Self {
            input_tokens: field("prompt_tokens"),
            output_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }
    }
}
