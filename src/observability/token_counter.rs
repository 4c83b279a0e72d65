use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::protocol::canonical::{CanonicalFrame, CanonicalUsage, FrameEvent};

/// Estimate the number of tokens in `text`.
///
/// Uses a lightweight heuristic (`bytes / 4`) to avoid loading model BPE tables.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Merge upstream-reported usage with local estimates.
///
/// - Always prefer upstream non-zero values
/// - Only fill `None` or zero fields with estimates
/// - Compute total = input + output if total is missing
#[must_use]
pub fn merge_usage(
    upstream: &CanonicalUsage,
    estimated_input: u64,
    estimated_output: u64,
) -> CanonicalUsage {
    let input_tokens = match upstream.input_tokens {
        Some(v) if v > 0 => v,
        _ => estimated_input,
    };
    let output_tokens = match upstream.output_tokens {
        Some(v) if v > 0 => v,
        _ => estimated_output,
    };
    let total_tokens = match upstream.total_tokens {
        Some(v) if v > 0 => v,
        _ => input_tokens + output_tokens,
    };

    CanonicalUsage {
        input_tokens: Some(input_tokens),
        output_tokens: Some(output_tokens),
        total_tokens: Some(total_tokens),
    }
}

/// Running totals over the frames of one normalized stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTally {
    pub text_frames: u64,
    pub tool_call_frames: u64,
    pub data_frames: u64,
    pub stop_frames: u64,
    pub error_frames: u64,
    pub text_bytes: u64,
    pub tool_argument_bytes: u64,
    /// Local output estimate over text and tool-argument frames.
    pub estimated_output_tokens: u64,
    /// Last usage object reported by the upstream, if any.
    pub upstream: Option<CanonicalUsage>,
    /// Reason carried by the first stop frame.
    pub finish_reason: Option<String>,
}

impl UsageTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, frame: &CanonicalFrame) {
        match frame.event {
            FrameEvent::Text => {
                self.text_frames += 1;
                if let Value::String(text) = &frame.data {
                    self.text_bytes += text.len() as u64;
                    self.estimated_output_tokens += estimate_tokens(text);
                }
            }
            FrameEvent::ToolCalls => {
                self.tool_call_frames += 1;
                for arguments in tool_arguments(&frame.data) {
                    self.tool_argument_bytes += arguments.len() as u64;
                    self.estimated_output_tokens += estimate_tokens(arguments);
                }
            }
            FrameEvent::Data => {
                self.data_frames += 1;
                if let Some(usage) = usage_payload(&frame.data) {
                    self.upstream = Some(CanonicalUsage::from_openai_value(usage));
                }
            }
            FrameEvent::Stop => {
                self.stop_frames += 1;
                if self.finish_reason.is_none() {
                    self.finish_reason = frame.data.as_str().map(str::to_owned);
                }
            }
            FrameEvent::Error => self.error_frames += 1,
        }
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        self.text_frames
            + self.tool_call_frames
            + self.data_frames
            + self.stop_frames
            + self.error_frames
    }

    /// Usage for the stream: upstream figures where reported, local
    /// estimates of the generated output otherwise.
    #[must_use]
    pub fn resolved_usage(&self) -> CanonicalUsage {
        let upstream = self.upstream.clone().unwrap_or_default();
        merge_usage(&upstream, 0, self.estimated_output_tokens)
    }
}

/// A `data` frame of exactly `{"usage": {...}}`.
fn usage_payload(data: &Value) -> Option<&Value> {
    let fields = data.as_object()?;
    if fields.len() != 1 {
        return None;
    }
    fields.get("usage").filter(|usage| usage.is_object())
}

fn tool_arguments(data: &Value) -> impl Iterator<Item = &str> {
    data.as_array()
        .into_iter()
        .flatten()
        .filter_map(|fragment| fragment.pointer("/function/arguments")?.as_str())
}

/// Log the summary of a finished stream at INFO level.
pub fn log_stream_usage(tally: &UsageTally, duration: Duration) {
    let usage = tally.resolved_usage();
    info!(
        frames = tally.frames(),
        text_frames = tally.text_frames,
        tool_call_frames = tally.tool_call_frames,
        error_frames = tally.error_frames,
        finish_reason = tally.finish_reason.as_deref().unwrap_or("none"),
        input_tokens = usage.input_tokens.unwrap_or(0),
        output_tokens = usage.output_tokens.unwrap_or(0),
        total_tokens = usage.total_tokens.unwrap_or(0),
        upstream_usage = tally.upstream.is_some(),
        duration_seconds = duration.as_secs_f64(),
        "stream completed"
    );
}
