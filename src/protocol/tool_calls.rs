use crate::protocol::canonical::ToolCallFragment;

/// Call kind assumed when a fragment does not name one.
pub const DEFAULT_TOOL_CALL_KIND: &str = "function";

/// Fill the structural defaults of one chunk's tool-call fragments.
///
/// A missing `index` becomes the fragment's position in `fragments`, a missing
/// `type` becomes `"function"`. Ids, names and argument text are left exactly
/// as received; argument fragments are concatenated by the stream consumer.
#[must_use]
pub fn normalize_tool_calls(mut fragments: Vec<ToolCallFragment>) -> Vec<ToolCallFragment> {
    for (position, fragment) in fragments.iter_mut().enumerate() {
        if fragment.index.is_none() {
            fragment.index = u32::try_from(position).ok();
        }
        if fragment.kind.is_none() {
            fragment.kind = Some(DEFAULT_TOOL_CALL_KIND.to_owned());
        }
    }
    fragments
}
