//! The `response_item` nested union.
//!
//! Response items mirror the model-facing conversation log: reasoning,
//! messages, tool calls and their outputs. Their payload shapes are a
//! separate vocabulary from the event-message types, so they get their
//! own dispatch.

use serde::Deserialize;
use serde_json::Value;

/// Item tags this crate knows how to decode. Anything else becomes
/// [`ResponseItem::Unknown`] rather than a parse failure.
const KNOWN_ITEM_TYPES: &[&str] = &[
    "reasoning",
    "message",
    "function_call",
    "function_call_output",
    "custom_tool_call",
    "custom_tool_call_output",
    "web_search_call",
    "ghost_snapshot",
    "compaction",
];

/// One response item from the conversation log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    Reasoning {
        #[serde(default)]
        summary: Vec<ReasoningSummary>,
    },
    Message {
        role: String,
        content: Vec<MessageContent>,
    },
    FunctionCall {
        name: String,
        /// JSON-encoded argument string, exactly as written by the model.
        arguments: String,
        call_id: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: FunctionOutput,
    },
    CustomToolCall {
        name: String,
        input: String,
        call_id: String,
    },
    CustomToolCallOutput {
        call_id: String,
        output: String,
    },
    WebSearchCall {
        #[serde(default)]
        action: Option<Value>,
    },
    GhostSnapshot {
        #[serde(default)]
        commit: Option<Value>,
    },
    Compaction {
        #[serde(default)]
        message: Option<String>,
    },
    /// Item type this crate does not know; the event-level raw payload
    /// preserves it verbatim.
    #[serde(skip)]
    Unknown { item_type: String },
}

/// One reasoning summary section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReasoningSummary {
    pub text: String,
}

/// One content block inside a message item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    InputText { text: String },
    OutputText { text: String },
    #[serde(other)]
    Other,
}

/// Tool output across two schema generations: a bare string, or a
/// structured object with a success flag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FunctionOutput {
    Text(String),
    Structured {
        content: String,
        #[serde(default)]
        success: Option<bool>,
    },
}

impl FunctionOutput {
    /// The output text regardless of generation.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Structured { content, .. } => content,
        }
    }
}

impl ResponseItem {
    /// Decode a response-item payload.
    ///
    /// Unrecognized item types become [`ResponseItem::Unknown`]; a known
    /// type with missing required fields yields `None` with a warning.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let item_type = payload.get("type").and_then(Value::as_str)?;
        if !KNOWN_ITEM_TYPES.contains(&item_type) {
            return Some(Self::Unknown {
                item_type: item_type.to_string(),
            });
        }
        match serde_json::from_value(payload.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(item_type, error = %e, "Skipping malformed response item");
                None
            }
        }
    }

    /// Concatenated text of a message item's content blocks.
    #[must_use]
    pub fn message_text(&self) -> Option<String> {
        let Self::Message { content, .. } = self else {
            return None;
        };
        Some(
            content
                .iter()
                .filter_map(|block| match block {
                    MessageContent::InputText { text } | MessageContent::OutputText { text } => {
                        Some(text.as_str())
                    }
                    MessageContent::Other => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reasoning_item() {
        let payload = json!({
            "type": "reasoning",
            "summary": [{"type": "summary_text", "text": "thinking about it"}]
        });
        let item = ResponseItem::from_payload(&payload).unwrap();
        match item {
            ResponseItem::Reasoning { summary } => {
                assert_eq!(summary[0].text, "thinking about it");
            }
            other => panic!("Expected Reasoning, got {other:?}"),
        }
    }

    #[test]
    fn test_message_item_text() {
        let payload = json!({
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "output_text", "text": "hello "},
                {"type": "refusal", "refusal": "nope"},
                {"type": "output_text", "text": "world"}
            ]
        });
        let item = ResponseItem::from_payload(&payload).unwrap();
        assert_eq!(item.message_text().unwrap(), "hello world");
    }

    #[test]
    fn test_function_call_round() {
        let payload = json!({
            "type": "function_call",
            "name": "shell",
            "arguments": "{\"command\":[\"ls\"]}",
            "call_id": "call_1"
        });
        let item = ResponseItem::from_payload(&payload).unwrap();
        assert!(matches!(item, ResponseItem::FunctionCall { ref name, .. } if name == "shell"));
    }

    #[test]
    fn test_function_output_both_generations() {
        let flat = json!({"type": "function_call_output", "call_id": "c", "output": "done"});
        let item = ResponseItem::from_payload(&flat).unwrap();
        let ResponseItem::FunctionCallOutput { output, .. } = item else {
            panic!("wrong variant");
        };
        assert_eq!(output.content(), "done");

        let structured = json!({
            "type": "function_call_output",
            "call_id": "c",
            "output": {"content": "exit 0", "success": true}
        });
        let item = ResponseItem::from_payload(&structured).unwrap();
        let ResponseItem::FunctionCallOutput { output, .. } = item else {
            panic!("wrong variant");
        };
        assert_eq!(output.content(), "exit 0");
    }

    #[test]
    fn test_unknown_item_type_preserved() {
        let payload = json!({"type": "hologram", "data": 1});
        let item = ResponseItem::from_payload(&payload).unwrap();
        assert_eq!(
            item,
            ResponseItem::Unknown {
                item_type: "hologram".to_string()
            }
        );
    }

    #[test]
    fn test_known_type_missing_fields_is_skipped() {
        let payload = json!({"type": "function_call", "name": "shell"});
        assert!(ResponseItem::from_payload(&payload).is_none());
    }

    #[test]
    fn test_missing_type_tag_is_skipped() {
        assert!(ResponseItem::from_payload(&json!({"data": 1})).is_none());
    }
}
