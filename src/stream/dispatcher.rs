use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::config::StreamConfig;
use crate::protocol::canonical::{CanonicalFrame, FrameEvent, ToolCallFragment};
use crate::protocol::chunk::{chunk_id, ChunkSignal, ClassifiedChunk};
use crate::protocol::tool_calls::normalize_tool_calls;
use crate::stream::hooks::StreamHooks;
use crate::stream::recovery::{classify_or_recover, ChunkOutcome};
use crate::util::next_stream_id;

/// Frames produced by a single chunk. Never more than content + usage + stop.
pub type ChunkFrames = SmallVec<[CanonicalFrame; 3]>;

/// Lifecycle of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    AwaitingFirst,
    Streaming,
    Terminated,
}

/// Per-stream state machine turning raw chunks into canonical frames.
///
/// Chunks are processed strictly one at a time, in arrival order. Malformed
/// chunks yield a single `error` frame and leave the state untouched.
#[derive(Debug)]
pub struct StreamDispatcher {
    state: DispatcherState,
    config: StreamConfig,
    hooks: StreamHooks,
    last_id: Option<String>,
    fallback_id: Option<String>,
    /// Last tool-call id seen for each fragment `index`.
    tool_call_ids: SmallVec<[(u32, String); 4]>,
}

impl StreamDispatcher {
    #[must_use]
    pub fn new(config: StreamConfig, hooks: StreamHooks) -> Self {
        Self {
            state: DispatcherState::AwaitingFirst,
            config,
            hooks,
            last_id: None,
            fallback_id: None,
            tool_call_ids: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Process one raw chunk and return the frames it produced.
    pub fn process_chunk(&mut self, chunk: Value) -> ChunkFrames {
        let mut out = ChunkFrames::new();
        self.process_chunk_into(chunk, &mut out);
        out
    }

    /// Process one raw chunk and append its frames to a caller-provided buffer.
    pub fn process_chunk_into(&mut self, chunk: Value, out: &mut impl Extend<CanonicalFrame>) {
        if self.state == DispatcherState::AwaitingFirst {
            self.state = DispatcherState::Streaming;
            tracing::debug!("stream started");
            self.hooks.fire_start();
        }

        let raw_id = chunk_id(&chunk);
        let id = self.resolve_id(raw_id.clone());
        match classify_or_recover(&chunk, &id, &self.config.error_message) {
            ChunkOutcome::Classified(classified) => self.dispatch(classified, raw_id, &id, out),
            ChunkOutcome::Recovered(frame) => out.extend(std::iter::once(frame)),
        }
    }

    fn dispatch(
        &mut self,
        classified: ClassifiedChunk,
        raw_id: Option<String>,
        id: &str,
        out: &mut impl Extend<CanonicalFrame>,
    ) {
        let mut token_fired = false;
        for signal in classified.signals {
            let frame = match signal {
                ChunkSignal::Text(text) => {
                    self.hooks.fire_text(&text);
                    CanonicalFrame::new(id, FrameEvent::Text, Value::String(text))
                }
                ChunkSignal::ToolCalls(fragments) => {
                    let mut fragments = normalize_tool_calls(fragments);
                    if self.config.carry_tool_call_id {
                        self.carry_tool_call_ids(&mut fragments);
                    }
                    self.hooks.fire_tool_call(&fragments);
                    let payload = serde_json::to_value(&fragments).unwrap_or_else(|err| {
                        tracing::warn!("failed to serialize tool-call fragments: {err}");
                        Value::Array(Vec::new())
                    });
                    CanonicalFrame::new(id, FrameEvent::ToolCalls, payload)
                }
                ChunkSignal::NullText(delta) => CanonicalFrame::new(id, FrameEvent::Data, delta),
                ChunkSignal::Unrecognized {
                    delta,
                    choice_index,
                } => CanonicalFrame::new(
                    id,
                    FrameEvent::Data,
                    attributed_delta(delta, raw_id.as_deref(), choice_index),
                ),
                ChunkSignal::Usage(usage) => {
                    let mut payload = Map::with_capacity(1);
                    payload.insert("usage".to_owned(), usage);
                    CanonicalFrame::new(id, FrameEvent::Data, Value::Object(payload))
                }
                ChunkSignal::Termination(reason) => {
                    self.terminate(id, reason, out);
                    continue;
                }
            };
            let content = frame.event.is_content();
            out.extend(std::iter::once(frame));
            if content && !token_fired {
                token_fired = true;
                self.hooks.fire_token();
            }
        }
    }

    fn terminate(&mut self, id: &str, reason: String, out: &mut impl Extend<CanonicalFrame>) {
        let first_stop = self.state != DispatcherState::Terminated;
        self.state = DispatcherState::Terminated;
        if first_stop {
            tracing::debug!(reason = %reason, "stream terminated");
            self.hooks.fire_completion(&reason);
        }
        out.extend(std::iter::once(CanonicalFrame::new(
            id,
            FrameEvent::Stop,
            Value::String(reason),
        )));
    }

    fn resolve_id(&mut self, chunk_id: Option<String>) -> String {
        if let Some(id) = chunk_id {
            self.last_id = Some(id.clone());
            return id;
        }
        if let Some(id) = self.last_id.as_ref() {
            return id.clone();
        }
        self.fallback_id
            .get_or_insert_with(|| next_stream_id(&self.config.fallback_id_prefix))
            .clone()
    }

    fn carry_tool_call_ids(&mut self, fragments: &mut [ToolCallFragment]) {
        for fragment in fragments {
            let Some(index) = fragment.index else {
                continue;
            };
            if let Some(id) = &fragment.id {
                match self.tool_call_ids.iter_mut().find(|(i, _)| *i == index) {
                    Some((_, last)) => last.clone_from(id),
                    None => self.tool_call_ids.push((index, id.clone())),
                }
            } else if let Some((_, last)) = self.tool_call_ids.iter().find(|(i, _)| *i == index) {
                fragment.id = Some(last.clone());
            }
        }
    }
}

/// Wrap an unrecognized delta with the chunk id and choice index it came from.
fn attributed_delta(delta: Value, id: Option<&str>, choice_index: Option<Value>) -> Value {
    let mut wrapper = Map::with_capacity(3);
    wrapper.insert("delta".to_owned(), delta);
    if let Some(id) = id {
        wrapper.insert("id".to_owned(), Value::String(id.to_owned()));
    }
    if let Some(index) = choice_index {
        wrapper.insert("index".to_owned(), index);
    }
    Value::Object(wrapper)
}
