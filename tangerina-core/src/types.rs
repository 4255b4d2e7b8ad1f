//! Core Data Types
//!
//! Conversation messages, tool-call requests and results, and the
//! provider-agnostic model turn shared by every crate in the workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// A message in the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "data", rename_all = "snake_case")]
pub enum ConversationMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        tool_name: String,
        call_id: Option<String>,
        /// JSON-serialized [`ToolResult`].
        content: String,
    },
}

impl ConversationMessage {
    /// Text content for system/user/assistant messages, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            ConversationMessage::System(t) | ConversationMessage::User(t) => Some(t),
            ConversationMessage::Assistant { content, .. } => content.as_deref(),
            ConversationMessage::ToolResult { content, .. } => Some(content),
        }
    }
}

/// A raw history entry supplied by the embedding application.
///
/// Only entries whose `content` is a non-blank string survive history
/// trimming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub content: Value,
}

impl HistoryEntry {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// A parsed tool invocation, valid for one loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Arguments keyed by parameter name.
    pub parameters: Map<String, Value>,
    /// Id assigned by the provider. Absent for text-parsed calls.
    pub provider_call_id: Option<String>,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            provider_call_id: None,
        }
    }

    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.provider_call_id = Some(id.into());
        self
    }
}

/// Outcome of a dispatched (or rejected) tool call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: Map<String, Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Map<String, Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Build a result from whatever a capability returned.
    ///
    /// Objects are split into `success`, `error` and the remaining data keys.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::failure("Capability returned a non-object result");
        };
        let success = map
            .remove("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let error = match map.remove("error") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        Self {
            success,
            data: map,
            error,
        }
    }

    /// Flat JSON object fed back to the model.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("success".into(), Value::Bool(self.success));
        for (k, v) in &self.data {
            obj.insert(k.clone(), v.clone());
        }
        if let Some(ref e) = self.error {
            obj.insert("error".into(), Value::String(e.clone()));
        }
        Value::Object(obj)
    }

    /// Error text, or the generic fallback used in replies.
    pub fn error_or_unknown(&self) -> &str {
        self.error.as_deref().unwrap_or("Erro desconhecido")
    }
}

/// One executed (or rejected) call, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedToolCall {
    pub tool: String,
    pub parameters: Map<String, Value>,
    pub result: ToolResult,
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// Model turn
// ---------------------------------------------------------------------------

/// Canonical reason a model turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Stop,
    Length,
    ToolCalls,
    Other,
    None,
}

impl TerminationReason {
    /// Map an OpenAI-style `finish_reason`.
    pub fn from_openai(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => TerminationReason::Stop,
            Some("length") => TerminationReason::Length,
            Some("tool_calls") => TerminationReason::ToolCalls,
            Some(_) => TerminationReason::Other,
            None => TerminationReason::None,
        }
    }
}

/// Provider-agnostic representation of one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub text_content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub termination: TerminationReason,
}

impl ModelTurn {
    /// The turn produced for a response that could not be understood.
    pub fn empty() -> Self {
        Self {
            text_content: None,
            tool_calls: Vec::new(),
            termination: TerminationReason::None,
        }
    }

    /// Trimmed text content, `None` when absent or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_result_from_capability_object() {
        let result = ToolResult::from_value(json!({
            "success": true,
            "message": "Now playing: Bohemian Rhapsody"
        }));
        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(
            result.data.get("message"),
            Some(&json!("Now playing: Bohemian Rhapsody"))
        );
    }

    #[test]
    fn tool_result_from_non_object_is_failure() {
        let result = ToolResult::from_value(json!("done"));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("non-object"));
    }

    #[test]
    fn tool_result_json_is_flat() {
        let result = ToolResult::failure("Function not available");
        assert_eq!(
            result.to_json(),
            json!({"success": false, "error": "Function not available"})
        );
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(TerminationReason::from_openai(Some("stop")), TerminationReason::Stop);
        assert_eq!(TerminationReason::from_openai(Some("length")), TerminationReason::Length);
        assert_eq!(
            TerminationReason::from_openai(Some("tool_calls")),
            TerminationReason::ToolCalls
        );
        assert_eq!(
            TerminationReason::from_openai(Some("content_filter")),
            TerminationReason::Other
        );
        assert_eq!(TerminationReason::from_openai(None), TerminationReason::None);
    }

    #[test]
    fn trimmed_text_ignores_blank() {
        let mut turn = ModelTurn::empty();
        turn.text_content = Some("   \n".into());
        assert_eq!(turn.trimmed_text(), None);
        turn.text_content = Some("  oi ".into());
        assert_eq!(turn.trimmed_text(), Some("oi"));
    }
}
