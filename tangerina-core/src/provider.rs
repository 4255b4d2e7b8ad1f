//! Chat Provider Trait
//!
//! Each model backend implements [`ChatProvider`]: it shapes the request
//! for its wire format and normalizes the raw response into a
//! [`ModelTurn`]. The orchestrator only ever sees the trait.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::types::{ConversationMessage, ModelTurn, TerminationReason, ToolCallRequest, ToolDefinition};

/// Trait implemented by each model backend (OpenAI, Zhipu, Gemini).
///
/// The constructor of an implementation builds its HTTP client; there is
/// no separate initialization step.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider identifier (e.g. "openai", "zhipu", "gemini").
    fn name(&self) -> &str;

    /// Candidate model ids in priority order.
    fn models_to_try(&self) -> Vec<String>;

    /// Send one request for `model` and return the raw response body.
    async fn make_request(
        &self,
        model: &str,
        messages: &[ConversationMessage],
        max_tokens: u32,
        tools: &[ToolDefinition],
    ) -> Result<Value>;

    /// Text content of a raw response.
    fn extract_content(&self, response: &Value) -> Option<String>;

    /// Native tool calls of a raw response. Malformed entries are dropped.
    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest>;

    /// Canonical termination reason of a raw response.
    fn extract_termination(&self, response: &Value) -> TerminationReason;

    /// Build the canonical turn. Never fails; unreadable responses yield
    /// an empty turn with termination `None`.
    fn normalize(&self, response: &Value) -> ModelTurn {
        ModelTurn {
            text_content: self.extract_content(response),
            tool_calls: self.extract_tool_calls(response),
            termination: self.extract_termination(response),
        }
    }
}
