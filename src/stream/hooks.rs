use std::fmt;

use crate::protocol::canonical::ToolCallFragment;

type Hook = Box<dyn FnMut() + Send>;
type TextHook = Box<dyn FnMut(&str) + Send>;
type ToolCallHook = Box<dyn FnMut(&[ToolCallFragment]) + Send>;

/// Optional observer callbacks fired synchronously while frames are produced.
///
/// Every slot is optional; an empty slot is a no-op.
///
/// - `on_start`: once, when the first chunk is processed.
/// - `on_text`: with the raw text of every `text` frame.
/// - `on_token`: once per chunk that produced a content frame.
/// - `on_tool_call`: once per `tool_calls` frame, with the normalized fragments.
/// - `on_completion`: once per stream, with the first termination reason.
#[derive(Default)]
pub struct StreamHooks {
    on_start: Option<Hook>,
    on_text: Option<TextHook>,
    on_token: Option<Hook>,
    on_tool_call: Option<ToolCallHook>,
    on_completion: Option<TextHook>,
}

impl StreamHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_start(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_text(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_text = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_token(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_token = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_tool_call(mut self, hook: impl FnMut(&[ToolCallFragment]) + Send + 'static) -> Self {
        self.on_tool_call = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_completion(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_completion = Some(Box::new(hook));
        self
    }

    pub(crate) fn fire_start(&mut self) {
        if let Some(hook) = self.on_start.as_mut() {
            hook();
        }
    }

    pub(crate) fn fire_text(&mut self, text: &str) {
        if let Some(hook) = self.on_text.as_mut() {
            hook(text);
        }
    }

    pub(crate) fn fire_token(&mut self) {
        if let Some(hook) = self.on_token.as_mut() {
            hook();
        }
    }

    pub(crate) fn fire_tool_call(&mut self, fragments: &[ToolCallFragment]) {
        if let Some(hook) = self.on_tool_call.as_mut() {
            hook(fragments);
        }
    }

    pub(crate) fn fire_completion(&mut self, reason: &str) {
        if let Some(hook) = self.on_completion.as_mut() {
            hook(reason);
        }
    }
}

impl fmt::Debug for StreamHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_text", &self.on_text.is_some())
            .field("on_token", &self.on_token.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_completion", &self.on_completion.is_some())
            .finish()
    }
}
