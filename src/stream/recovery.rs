use serde_json::Value;

use crate::protocol::canonical::{CanonicalFrame, FrameEvent};
use crate::protocol::chunk::{classify_chunk, ClassifiedChunk};
use crate::protocol::error_shapes::chunk_error_payload;

/// Result of classifying one chunk inside the failure boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Classified(ClassifiedChunk),
    /// The chunk was malformed; this `error` frame replaces all of its frames.
    Recovered(CanonicalFrame),
}

/// Classify `chunk`, converting a structural failure into an `error` frame.
///
/// `id` is the correlation id the error frame is written under and `message`
/// its human-readable `body.message`. The raw chunk is embedded in the payload
/// for diagnosis.
#[must_use]
pub fn classify_or_recover(chunk: &Value, id: &str, message: &str) -> ChunkOutcome {
    match classify_chunk(chunk) {
        Ok(classified) => ChunkOutcome::Classified(classified),
        Err(err) => {
            tracing::debug!(kind = err.name(), "recovered malformed stream chunk: {err}");
            ChunkOutcome::Recovered(CanonicalFrame::new(
                id,
                FrameEvent::Error,
                chunk_error_payload(message, &err, chunk),
            ))
        }
    }
}
