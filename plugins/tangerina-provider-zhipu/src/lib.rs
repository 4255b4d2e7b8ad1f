//! Zhipu GLM Chat Provider
//!
//! Implements `ChatProvider` for the Zhipu BigModel chat completions API,
//! which speaks the OpenAI-compatible wire format plus `top_p`. The
//! configured model is tried first, then the remaining GLM models.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use tangerina_core::provider::ChatProvider;
use tangerina_core::types::{ConversationMessage, TerminationReason, ToolCallRequest, ToolDefinition};
use tangerina_provider_openai::openai_compat;

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4-plus";
pub const FALLBACK_MODELS: [&str; 4] = ["glm-4-plus", "glm-4-flash", "glm-3-turbo", "glm-4"];

const TOP_P: f64 = 0.9;

/// Zhipu GLM provider.
pub struct ZhipuProvider {
    api_key: String,
    model: String,
    fallback_models: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

impl ZhipuProvider {
    pub fn new(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            fallback_models: FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the fallback list (the primary model is always tried first).
    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }
}

#[async_trait]
impl ChatProvider for ZhipuProvider {
    fn name(&self) -> &str {
        "zhipu"
    }

    fn models_to_try(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        models.extend(
            self.fallback_models
                .iter()
                .filter(|m| **m != self.model)
                .cloned(),
        );
        models
    }

    async fn make_request(
        &self,
        model: &str,
        messages: &[ConversationMessage],
        max_tokens: u32,
        tools: &[ToolDefinition],
    ) -> Result<Value> {
        let mut body = openai_compat::build_request_body(model, messages, max_tokens, tools);
        body["top_p"] = json!(TOP_P);
        let url = format!("{}/chat/completions", self.base_url);
        openai_compat::post_chat(&self.client, &url, &self.api_key, &body, "Zhipu").await
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_candidates() {
        let provider = ZhipuProvider::new("k", None, None);
        assert_eq!(
            provider.models_to_try(),
            vec!["glm-4-plus", "glm-4-flash", "glm-3-turbo", "glm-4"]
        );
    }

    #[test]
    fn configured_model_goes_first_without_repeat() {
        let provider = ZhipuProvider::new("k", Some("glm-4-flash"), None);
        assert_eq!(
            provider.models_to_try(),
            vec!["glm-4-flash", "glm-4-plus", "glm-3-turbo", "glm-4"]
        );
    }

    #[test]
    fn custom_fallbacks() {
        let provider = ZhipuProvider::new("k", Some("glm-4-air"), None)
            .with_fallback_models(vec!["glm-4-flash".into()]);
        assert_eq!(provider.models_to_try(), vec!["glm-4-air", "glm-4-flash"]);
    }
}
