//! Classification of raw, provider-shaped stream chunks.
//!
//! A raw chunk is an opaque JSON value in the OpenAI chat-completion chunk
//! shape (`id`, `choices[].delta`, `choices[].finish_reason`, `usage`). Only
//! the first choice is classified. The result is a closed list of
//! [`ChunkSignal`]s in emission order; anything the classifier does not
//! recognize ends up in [`ChunkSignal::Unrecognized`] rather than being
//! special-cased.

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::error::{json_kind, ChunkError};
use crate::protocol::canonical::ToolCallFragment;

const CONTENT_FIELD: &str = "content";
const TOOL_CALLS_FIELD: &str = "tool_calls";
/// Delta fields that identify the speaker rather than carry content.
const IDENTIFYING_FIELDS: &[&str] = &["role"];

/// One unit of information extracted from a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSignal {
    /// `content` is a string and nothing else in the delta carries content.
    Text(String),
    /// Non-empty `tool_calls` array, fragments as received (not yet normalized).
    ToolCalls(Vec<ToolCallFragment>),
    /// `content` is present but null; carries the delta unchanged.
    NullText(Value),
    /// A delta of any other shape, with the choice index it came from.
    Unrecognized {
        delta: Value,
        choice_index: Option<Value>,
    },
    /// Upstream token usage object.
    Usage(Value),
    /// Provider termination reason (`finish_reason`).
    Termination(String),
}

/// A successfully classified chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedChunk {
    /// Correlation id carried by the chunk, if any.
    pub id: Option<String>,
    /// Signals in emission order: content, then usage, then termination.
    pub signals: SmallVec<[ChunkSignal; 3]>,
}

/// Read the correlation id of a chunk without classifying it.
#[must_use]
pub fn chunk_id(chunk: &Value) -> Option<String> {
    match chunk.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Classify one raw chunk.
///
/// # Errors
///
/// Returns a [`ChunkError`] when a structural field the classification relies
/// on is missing or has the wrong JSON type. Unknown delta shapes are not
/// errors.
pub fn classify_chunk(chunk: &Value) -> Result<ClassifiedChunk, ChunkError> {
    let Value::Object(fields) = chunk else {
        return Err(ChunkError::NotAnObject {
            found: json_kind(chunk),
        });
    };
    let Some(Value::Array(choices)) = fields.get("choices") else {
        return Err(ChunkError::MissingChoices);
    };

    let mut classified = ClassifiedChunk {
        id: chunk_id(chunk),
        signals: SmallVec::new(),
    };

    let mut termination = None;
    if let Some(first) = choices.first() {
        let Value::Object(choice) = first else {
            return Err(ChunkError::InvalidChoice {
                position: 0,
                found: json_kind(first),
            });
        };
        termination = finish_reason(choice)?;
        match choice.get("delta") {
            None | Some(Value::Null) => {}
            Some(Value::Object(delta)) => {
                let choice_index = choice.get("index").cloned();
                classified
                    .signals
                    .extend(classify_delta(delta, choice_index)?);
            }
            Some(other) => {
                return Err(ChunkError::InvalidDelta {
                    found: json_kind(other),
                })
            }
        }
    }

    if let Some(usage) = fields.get("usage").filter(|usage| usage.is_object()) {
        classified.signals.push(ChunkSignal::Usage(usage.clone()));
    }
    if let Some(reason) = termination {
        classified.signals.push(ChunkSignal::Termination(reason));
    }
    Ok(classified)
}

fn finish_reason(choice: &Map<String, Value>) -> Result<Option<String>, ChunkError> {
    match choice.get("finish_reason") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(reason)) if reason.is_empty() => Ok(None),
        Some(Value::String(reason)) => Ok(Some(reason.clone())),
        Some(other) => Err(ChunkError::InvalidFinishReason {
            found: json_kind(other),
        }),
    }
}

/// `None` when the delta carries nothing: `{}`, `{"role":..}`, or only nulls
/// and an empty `tool_calls` array.
fn classify_delta(
    delta: &Map<String, Value>,
    choice_index: Option<Value>,
) -> Result<Option<ChunkSignal>, ChunkError> {
    match delta.get(TOOL_CALLS_FIELD) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if items.is_empty() => {}
        Some(Value::Array(items)) => {
            let fragments = items
                .iter()
                .map(|item| serde_json::from_value::<ToolCallFragment>(item.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ChunkError::InvalidToolCalls(e.to_string()))?;
            return Ok(Some(ChunkSignal::ToolCalls(fragments)));
        }
        Some(other) => {
            return Err(ChunkError::InvalidToolCalls(format!(
                "expected an array, found {}",
                json_kind(other)
            )))
        }
    }

    let only_content = delta
        .iter()
        .all(|(key, value)| key == CONTENT_FIELD || is_ignorable_field(key, value));

    let signal = match delta.get(CONTENT_FIELD) {
        Some(Value::String(text)) if only_content => ChunkSignal::Text(text.clone()),
        Some(Value::Null) if only_content => ChunkSignal::NullText(Value::Object(delta.clone())),
        None if only_content => return Ok(None),
        _ => ChunkSignal::Unrecognized {
            delta: Value::Object(delta.clone()),
            choice_index,
        },
    };
    Ok(Some(signal))
}

fn is_ignorable_field(key: &str, value: &Value) -> bool {
    if IDENTIFYING_FIELDS.contains(&key) {
        return true;
    }
    match value {
        Value::Null => true,
        Value::Array(items) => key == TOOL_CALLS_FIELD && items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signals(chunk: Value) -> Vec<ChunkSignal> {
        classify_chunk(&chunk).unwrap().signals.into_vec()
    }

    #[test]
    fn text_delta() {
        let chunk = json!({"id":"1","choices":[{"delta":{"content":"Hello"},"index":0}]});
        let classified = classify_chunk(&chunk).unwrap();
        assert_eq!(classified.id.as_deref(), Some("1"));
        assert_eq!(
            classified.signals.into_vec(),
            vec![ChunkSignal::Text("Hello".into())]
        );
    }

    #[test]
    fn role_next_to_text_is_still_text() {
        assert_eq!(
            signals(json!({"choices":[{"delta":{"role":"assistant","content":""}}]})),
            vec![ChunkSignal::Text(String::new())]
        );
    }

    #[test]
    fn null_text_is_its_own_variant() {
        assert_eq!(
            signals(json!({"choices":[{"delta":{"content":null},"index":0}]})),
            vec![ChunkSignal::NullText(json!({"content":null}))]
        );
    }

    #[test]
    fn text_next_to_other_content_is_unrecognized() {
        assert_eq!(
            signals(json!({"choices":[{"delta":{"content":"a","reasoning":"b"},"index":2}]})),
            vec![ChunkSignal::Unrecognized {
                delta: json!({"content":"a","reasoning":"b"}),
                choice_index: Some(json!(2)),
            }]
        );
    }

    #[test]
    fn tool_calls_win_over_null_content() {
        let got = signals(json!({"choices":[{"delta":{
            "role":"assistant",
            "content":null,
            "tool_calls":[{"index":1,"function":{"arguments":"{\"city\""}}]
        }}]}));
        let [ChunkSignal::ToolCalls(fragments)] = got.as_slice() else {
            panic!("expected tool calls, got {got:?}");
        };
        assert_eq!(fragments[0].index, Some(1));
        assert_eq!(fragments[0].arguments(), "{\"city\"");
    }

    #[test]
    fn empty_tool_calls_array_is_ignored() {
        assert_eq!(
            signals(json!({"choices":[{"delta":{"content":"x","tool_calls":[]}}]})),
            vec![ChunkSignal::Text("x".into())]
        );
    }

    #[test]
    fn delta_without_content_carries_nothing() {
        assert!(signals(json!({"choices":[{"delta":{"tool_calls":[]},"index":0}]})).is_empty());
        assert!(signals(json!({"choices":[{"delta":{"role":"assistant","tool_calls":[]}}]}))
            .is_empty());
        assert!(signals(json!({"choices":[{"delta":{"role":"assistant"}}]})).is_empty());
        assert!(signals(json!({"choices":[{"delta":{"tool_calls":null}}]})).is_empty());
    }

    #[test]
    fn empty_delta_with_finish_reason_is_termination_only() {
        assert_eq!(
            signals(json!({"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]})),
            vec![ChunkSignal::Termination("stop".into())]
        );
    }

    #[test]
    fn delta_and_finish_reason_keep_order() {
        assert_eq!(
            signals(json!({"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]})),
            vec![
                ChunkSignal::Text("bye".into()),
                ChunkSignal::Termination("stop".into())
            ]
        );
    }

    #[test]
    fn null_delta_with_finish_reason_is_termination_only() {
        assert_eq!(
            signals(json!({"choices":[{"delta":null,"finish_reason":"stop","index":2}]})),
            vec![ChunkSignal::Termination("stop".into())]
        );
    }

    #[test]
    fn usage_only_chunk() {
        assert_eq!(
            signals(json!({"id":"u","choices":[],"usage":{"total_tokens":3}})),
            vec![ChunkSignal::Usage(json!({"total_tokens":3}))]
        );
    }

    #[test]
    fn empty_choices_carry_nothing() {
        assert!(signals(json!({"id":"x","choices":[]})).is_empty());
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert_eq!(
            classify_chunk(&json!({"id":"1"})),
            Err(ChunkError::MissingChoices)
        );
        assert_eq!(
            classify_chunk(&json!({"choices":{"0":{}}})),
            Err(ChunkError::MissingChoices)
        );
    }

    #[test]
    fn structural_type_errors() {
        assert_eq!(
            classify_chunk(&json!("oops")),
            Err(ChunkError::NotAnObject { found: "string" })
        );
        assert_eq!(
            classify_chunk(&json!({"choices":[42]})),
            Err(ChunkError::InvalidChoice {
                position: 0,
                found: "number"
            })
        );
        assert_eq!(
            classify_chunk(&json!({"choices":[{"delta":"hi"}]})),
            Err(ChunkError::InvalidDelta { found: "string" })
        );
        assert_eq!(
            classify_chunk(&json!({"choices":[{"finish_reason":1}]})),
            Err(ChunkError::InvalidFinishReason { found: "number" })
        );
        assert!(matches!(
            classify_chunk(&json!({"choices":[{"delta":{"tool_calls":"x"}}]})),
            Err(ChunkError::InvalidToolCalls(_))
        ));
        assert!(matches!(
            classify_chunk(&json!({"choices":[{"delta":{"tool_calls":[{"index":-1}]}}]})),
            Err(ChunkError::InvalidToolCalls(_))
        ));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        assert_eq!(chunk_id(&json!({"id": 7})), Some("7".to_owned()));
        assert_eq!(chunk_id(&json!({"id": null})), None);
    }
}
