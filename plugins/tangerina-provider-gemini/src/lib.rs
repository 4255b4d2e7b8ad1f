//! Google Gemini Chat Provider
//!
//! Implements `ChatProvider` for the Gemini `generateContent` API.
//! System messages become `systemInstruction`, tool results become
//! `functionResponse` parts and `functionCall` parts come back as native
//! tool calls.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use tangerina_core::provider::ChatProvider;
use tangerina_core::types::{ConversationMessage, TerminationReason, ToolCallRequest, ToolDefinition};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODELS: [&str; 2] = ["gemini-2.5-flash-lite", "gemini-2.0-flash-exp"];

const TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Google Gemini provider.
pub struct GeminiProvider {
    api_key: String,
    models: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// `models` are tried in order; an empty list means [`DEFAULT_MODELS`].
    pub fn new(api_key: &str, models: Vec<String>, base_url: Option<&str>) -> Self {
        let models = if models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
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

// ---------------------------------------------------------------------------
// Request conversion
// ---------------------------------------------------------------------------

/// Tool output as a `functionResponse` payload. The API wants an object.
fn function_response(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "error": content }),
    }
}

/// Convert conversation messages to `(systemInstruction, contents)`.
pub fn convert_messages(messages: &[ConversationMessage]) -> (Option<Value>, Vec<Value>) {
    let mut system_texts: Vec<&str> = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        match msg {
            ConversationMessage::System(t) => {
                if !t.trim().is_empty() {
                    system_texts.push(t);
                }
            }
            ConversationMessage::User(t) => {
                if !t.trim().is_empty() {
                    contents.push(json!({ "role": "user", "parts": [{ "text": t }] }));
                }
            }
            ConversationMessage::Assistant { content, tool_calls } => {
                let mut parts = Vec::new();
                if let Some(t) = content.as_deref().filter(|t| !t.trim().is_empty()) {
                    parts.push(json!({ "text": t }));
                }
                for call in tool_calls {
                    parts.push(json!({
                        "functionCall": {
                            "name": call.tool_name,
                            "args": Value::Object(call.parameters.clone())
                        }
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
            ConversationMessage::ToolResult {
                tool_name, content, ..
            } => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": tool_name,
                            "response": function_response(content)
                        }
                    }]
                }));
            }
        }
    }

    let system_instruction = (!system_texts.is_empty())
        .then(|| json!({ "parts": [{ "text": system_texts.join("\n\n") }] }));
    (system_instruction, contents)
}

/// Reduce a JSON-schema parameter object to what function declarations
/// accept: upper-case types, descriptions and the required list.
pub fn convert_parameters(parameters: &Value) -> Value {
    let mut properties = Map::new();
    if let Some(props) = parameters.get("properties").and_then(|p| p.as_object()) {
        for (name, spec) in props {
            let ty = match spec.get("type").and_then(|t| t.as_str()).unwrap_or("string") {
                "integer" => "INTEGER",
                "number" => "NUMBER",
                "boolean" => "BOOLEAN",
                "array" => "ARRAY",
                "object" => "OBJECT",
                _ => "STRING",
            };
            let mut schema = json!({ "type": ty });
            if let Some(desc) = spec
                .get("description")
                .and_then(|d| d.as_str())
                .filter(|d| !d.is_empty())
            {
                schema["description"] = json!(desc);
            }
            properties.insert(name.clone(), schema);
        }
    }

    let mut schema = json!({ "type": "OBJECT", "properties": properties });
    if let Some(required) = parameters
        .get("required")
        .and_then(|r| r.as_array())
        .filter(|r| !r.is_empty())
    {
        schema["required"] = json!(required);
    }
    schema
}

/// Full `generateContent` request body.
pub fn build_request_body(
    messages: &[ConversationMessage],
    max_tokens: u32,
    tools: &[ToolDefinition],
) -> Value {
    let (system_instruction, contents) = convert_messages(messages);

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": max_tokens,
            "temperature": TEMPERATURE,
        }
    });

    if let Some(sys) = system_instruction {
        body["systemInstruction"] = sys;
    }

    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": convert_parameters(&t.parameters)
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    body
}

// ---------------------------------------------------------------------------
// Response normalization
// ---------------------------------------------------------------------------

fn first_candidate(response: &Value) -> Option<&Value> {
    response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
}

fn candidate_parts(response: &Value) -> &[Value] {
    first_candidate(response)
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Push `call` unless an identical name/args pair was already seen.
fn push_function_call(call: &Value, seen: &mut HashSet<String>, out: &mut Vec<ToolCallRequest>) {
    let Some(name) = call.get("name").and_then(|n| n.as_str()).filter(|n| !n.is_empty()) else {
        return;
    };
    let args = match call.get("args") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    let id = format!("{name}_{}", Value::Object(args.clone()));
    if seen.insert(id.clone()) {
        out.push(ToolCallRequest::new(name, args).with_call_id(id));
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
        let body = build_request_body(messages, max_tokens, tools);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        debug!(model = %model, "calling Gemini API");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("failed to call Gemini API")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error (HTTP {}): {}", status, body);
        }

        response.json().await.context("invalid JSON from Gemini API")
    }

    fn extract_content(&self, response: &Value) -> Option<String> {
        let texts: Vec<&str> = candidate_parts(response)
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .filter(|t| !t.is_empty())
            .collect();
        (!texts.is_empty()).then(|| texts.join(" "))
    }

    fn extract_tool_calls(&self, response: &Value) -> Vec<ToolCallRequest> {
        let mut seen = HashSet::new();
        let mut calls = Vec::new();

        for part in candidate_parts(response) {
            if let Some(fc) = part.get("functionCall") {
                push_function_call(fc, &mut seen, &mut calls);
            }
        }

        if calls.is_empty() {
            if let Some(top_level) = response.get("functionCalls").and_then(|f| f.as_array()) {
                for fc in top_level {
                    push_function_call(fc, &mut seen, &mut calls);
                }
            }
        }

        calls
    }

    fn extract_termination(&self, response: &Value) -> TerminationReason {
        match first_candidate(response)
            .and_then(|c| c.get("finishReason"))
            .and_then(|r| r.as_str())
        {
            Some("STOP") => TerminationReason::Stop,
            Some("MAX_TOKENS") => TerminationReason::Length,
            Some(_) => TerminationReason::Other,
            None => TerminationReason::None,
        }
    }
}
