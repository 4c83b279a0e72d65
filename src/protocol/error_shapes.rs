use serde::Serialize;

use crate::error::ChunkError;

/// Type tag of every error frame produced for a malformed chunk.
pub const STREAM_CHUNK_ERROR_TYPE: &str = "StreamChunkError";

#[derive(Serialize)]
struct ErrorFramePayload<'a> {
    body: ErrorBody<'a>,
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    context: ErrorContext<'a>,
}

#[derive(Serialize)]
struct ErrorContext<'a> {
    error: FailureDescription,
    chunk: &'a serde_json::Value,
}

#[derive(Serialize)]
struct FailureDescription {
    message: String,
    name: &'static str,
}

/// Build the payload of an `error` frame for a chunk that failed classification.
///
/// Shape: `{"body":{"message",context:{"error":{"message","name"},"chunk"}},"type"}`.
#[must_use]
pub(crate) fn chunk_error_payload(
    message: &str,
    err: &ChunkError,
    chunk: &serde_json::Value,
) -> serde_json::Value {
    let payload = ErrorFramePayload {
        body: ErrorBody {
            message,
            context: ErrorContext {
                error: FailureDescription {
                    message: err.to_string(),
                    name: err.name(),
                },
                chunk,
            },
        },
        type_: STREAM_CHUNK_ERROR_TYPE,
    };
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}
