use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Internal tool call format (provider-agnostic).
/// Every model router adapter converts provider-specific tool calls to/from
/// this while a call is still being streamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// A tool call as it is recorded on an assistant conversation message —
/// `arguments` stays a JSON string here because that is exactly what the
/// provider emitted and exactly what is replayed back to it on the next
/// turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// A message in the conversation log, tagged by role.
///
/// `Tool` messages are always produced from a [`ToolResultEnvelope`] that
/// has already been serialized to a single JSON string (`content`); the
/// envelope's `tool_call_id` must match a `PendingToolCall.id` emitted by a
/// prior `Assistant` message in the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<PendingToolCall>,
        /// Discriminates event-derived assistant records (chart, data
        /// preview, artifact, image, reasoning) from plain text replies, so
        /// replay can reconstruct UI state from the log alone.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_payload: Option<Value>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message::System { content: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message::User { content: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: text.into(),
            tool_calls: Vec::new(),
            event_type: None,
            event_payload: None,
        }
    }

    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<PendingToolCall>) -> Self {
        Message::Assistant {
            content: text.into(),
            tool_calls,
            event_type: None,
            event_payload: None,
        }
    }

    pub fn assistant_event(event_type: impl Into<String>, payload: Value) -> Self {
        Message::Assistant {
            content: String::new(),
            tool_calls: Vec::new(),
            event_type: Some(event_type.into()),
            event_payload: Some(payload),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role_str(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Plain-text content for rendering/prompting; event-derived assistant
    /// records carry their payload in `event_payload` instead.
    pub fn text(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }
}

/// Artifact reference embedded in a [`ToolResultEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub download_url: String,
}

/// Uniform structured result returned by every tool.
///
/// Invariant: when `success` is `false`, `message` must be a non-empty
/// diagnostic; `data` may legitimately be empty in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataframe_preview: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl ToolResultEnvelope {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            chart_data: None,
            dataframe_preview: None,
            artifacts: Vec::new(),
            metadata: Value::Null,
        }
    }

    /// Build a failure envelope. `message` must not be empty — callers that
    /// violate this invariant get a generic diagnostic instead of silence.
    pub fn error(message: impl Into<String>, error_kind: &str) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "unknown error".to_string()
        } else {
            message
        };
        Self {
            success: false,
            message,
            data: Value::Null,
            chart_data: None,
            dataframe_preview: None,
            artifacts: Vec::new(),
            metadata: serde_json::json!({ "error_kind": error_kind }),
        }
    }

    pub fn cancelled() -> Self {
        Self::error("tool call cancelled", "cancelled")
    }

    pub fn has_chart(&self) -> bool {
        self.chart_data.is_some()
    }

    pub fn has_dataframe(&self) -> bool {
        self.dataframe_preview.is_some()
    }

    /// True when this envelope's metadata asks the runner to suspend the
    /// loop and request clarification from the user (§4.6 "ask_user_question").
    pub fn wants_user_clarification(&self) -> bool {
        self.metadata
            .get("ask_user_question")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_never_has_empty_message() {
        let env = ToolResultEnvelope::error("", "internal");
        assert!(!env.message.is_empty());
    }

    #[test]
    fn ok_envelope_roundtrips_through_json() {
        let env = ToolResultEnvelope::ok("done", serde_json::json!({"x": 1}));
        let s = serde_json::to_string(&env).unwrap();
        let back: ToolResultEnvelope = serde_json::from_str(&s).unwrap();
        assert!(back.success);
        assert_eq!(back.data["x"], 1);
    }

    #[test]
    fn message_role_str_matches_variant() {
        assert_eq!(Message::user("hi").role_str(), "user");
        assert_eq!(Message::assistant("hi").role_str(), "assistant");
        assert_eq!(
            Message::tool_result("c1", "6").role_str(),
            "tool"
        );
    }

    #[test]
    fn assistant_with_tool_calls_serializes_arguments_as_string() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![PendingToolCall {
                id: "c1".into(),
                name: "compute".into(),
                arguments: r#"{"values":[1,2,3]}"#.into(),
            }],
        );
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["tool_calls"][0]["arguments"], r#"{"values":[1,2,3]}"#);
    }

    #[test]
    fn wants_user_clarification_reads_metadata_flag() {
        let mut env = ToolResultEnvelope::ok("need input", Value::Null);
        assert!(!env.wants_user_clarification());
        env.metadata = serde_json::json!({"ask_user_question": true});
        assert!(env.wants_user_clarification());
    }
}
