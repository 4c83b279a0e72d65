use bytes::Bytes;
use memchr::memchr2;

use crate::protocol::canonical::CanonicalFrame;

/// Encode a canonical frame into its SSE text block.
///
/// ```text
/// id: <id>
/// event: <event>
/// data: <json>
///
/// ```
///
/// The payload is written as compact JSON, so it never spans lines. Line
/// breaks inside the id are dropped to keep the block self-delimited.
#[must_use]
pub fn encode_frame(frame: &CanonicalFrame) -> String {
    let data = serde_json::to_string(&frame.data).unwrap_or_else(|_| "null".to_owned());
    let event = frame.event.as_str();

    let mut out = String::with_capacity(24 + frame.id.len() + event.len() + data.len());
    out.push_str("id: ");
    push_single_line(&mut out, &frame.id);
    out.push_str("\nevent: ");
    out.push_str(event);
    out.push_str("\ndata: ");
    out.push_str(&data);
    out.push_str("\n\n");
    out
}

/// Same as [`encode_frame`], as bytes ready for a response body.
#[must_use]
pub fn encode_frame_bytes(frame: &CanonicalFrame) -> Bytes {
    Bytes::from(encode_frame(frame))
}

#[inline]
fn push_single_line(out: &mut String, value: &str) {
    if memchr2(b'\n', b'\r', value.as_bytes()).is_none() {
        out.push_str(value);
        return;
    }
    out.extend(value.chars().filter(|c| !matches!(c, '\n' | '\r')));
}
