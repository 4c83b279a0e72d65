use std::sync::atomic::{AtomicU64, Ordering};

const HEX: &[u8; 16] = b"0123456789abcdef";

static STREAM_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next `<prefix>-<16 hex digits>` id from the process-wide stream counter.
pub(crate) fn next_stream_id(prefix: &str) -> String {
    next_generated_id(prefix, &STREAM_SEQ)
}

pub(crate) fn next_generated_id(prefix: &str, counter: &AtomicU64) -> String {
    let id = counter.fetch_add(1, Ordering::Relaxed);
    let mut out = String::with_capacity(prefix.len() + 17);
    out.push_str(prefix);
    out.push('-');
    push_u64_hex_16(&mut out, id);
    out
}

/// Pull the payload out of an SSE `data:` value.
///
/// Returns `None` for empty payloads and the `[DONE]` sentinel.
#[inline]
pub(crate) fn extract_sse_data_payload(data: &str) -> Option<&str> {
    let payload = data.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}
