//! OpenAI Chat Provider
//!
//! Implements `ChatProvider` for the OpenAI Chat Completions API.
//! Also supports OpenAI-compatible endpoints through a base-URL override.

pub mod openai_compat;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use tangerina_core::provider::ChatProvider;
use tangerina_core::types::{ConversationMessage, TerminationReason, ToolCallRequest, ToolDefinition};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI Chat Completions provider.
pub struct OpenAiProvider {
    api_key: String,
    models: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// `models` are tried in order; an empty list means [`DEFAULT_MODEL`].
    pub fn new(api_key: &str, models: Vec<String>, base_url: Option<&str>) -> Self {
        let models = if models.is_empty() {
            vec![DEFAULT_MODEL.to_string()]
        } else {
            models
        };
        Self {
            api_key: api_key.to_string(),
            models,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn models_to_try(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn make_request(
        &self,
        model: &str,
        messages: &[ConversationMessage],
        max_tokens: u32,
        tools: &[ToolDefinition],
    ) -> Result<Value> {
        let body = openai_compat::build_request_body(model, messages, max_tokens, tools);
        let url = format!("{}/v1/chat/completions", self.base_url);
        openai_compat::post_chat(&self.client, &url, &self.api_key, &body, "OpenAI").await
    }

    fn extract_content(&self, response: &Value) -> Option<String> {
        openai_compat::extract_content(response)
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        openai_compat::extract_tool_calls(response)
    }

    fn extract_termination(&self, response: &Value) -> TerminationReason {
        openai_compat::extract_termination(response)
    }
}
