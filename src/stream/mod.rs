pub mod dispatcher;
pub mod encoder;
pub mod hooks;
pub mod normalized;
pub mod recovery;
pub mod sse;

pub use dispatcher::{DispatcherState, StreamDispatcher};
pub use encoder::{encode_frame, encode_frame_bytes};
pub use hooks::StreamHooks;
pub use normalized::{normalize_chunks, normalize_stream, NormalizedStream};
pub use sse::{chunk_stream, sse_event_stream, SseEvent, SseParser};
