//! OpenAI-compatible wire format
//!
//! Request body construction and response normalization for the Chat
//! Completions shape (`choices[0].message`, `tool_calls`,
//! `finish_reason`). Shared by every provider that speaks this dialect.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tangerina_core::types::{ConversationMessage, TerminationReason, ToolCallRequest, ToolDefinition};

/// Sampling temperature used for every chat request.
pub const TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Id used to pair an assistant tool call with its result message.
fn call_id(tool_name: &str, call_id: Option<&str>) -> String {
    call_id.unwrap_or(tool_name).to_string()
}

/// Convert one conversation message to the API format.
pub fn message_to_json(msg: &ConversationMessage) -> Value {
    match msg {
        ConversationMessage::System(t) => json!({ "role": "system", "content": t }),
        ConversationMessage::User(t) => json!({ "role": "user", "content": t }),
        ConversationMessage::Assistant { content, tool_calls } => {
            let mut m = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                let tc: Vec<Value> = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": call_id(&c.tool_name, c.provider_call_id.as_deref()),
                            "type": "function",
                            "function": {
                                "name": c.tool_name,
                                "arguments": Value::Object(c.parameters.clone()).to_string()
                            }
                        })
                    })
                    .collect();
                m["tool_calls"] = json!(tc);
            }
            m
        }
        ConversationMessage::ToolResult {
            tool_name,
            call_id: id,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": call_id(tool_name, id.as_deref()),
            "name": tool_name,
            "content": content
        }),
    }
}

/// Tool definitions in the `{"type": "function", ...}` envelope.
pub fn tools_to_json(tools: &[ToolDefinition]) -> Value {
    let api_tools: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                }
            })
        })
        .collect();
    json!(api_tools)
}

/// Full chat completions request body.
pub fn build_request_body(
    model: &str,
    messages: &[ConversationMessage],
    max_tokens: u32,
    tools: &[ToolDefinition],
) -> Value {
    let api_messages: Vec<Value> = messages.iter().map(message_to_json).collect();

    let mut body = json!({
        "model": model,
        "messages": api_messages,
        "temperature": TEMPERATURE,
        "max_tokens": max_tokens,
        "stream": false,
    });

    if !tools.is_empty() {
        body["tools"] = tools_to_json(tools);
    }

    body
}

/// POST a request body and return the parsed JSON response.
pub async fn post_chat(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Value,
    label: &str,
) -> Result<Value> {
    debug!(url = %url, "calling {label} API");

    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to call {label} API"))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{label} API error (HTTP {status}): {body}");
    }

    response
        .json()
        .await
        .with_context(|| format!("invalid JSON from {label} API"))
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

fn first_choice(response: &Value) -> Option<&Value> {
    response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
}

/// `choices[0].message.content`, when it is a string.
pub fn extract_content(response: &Value) -> Option<String> {
    first_choice(response)
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(String::from)
}

/// `choices[0].message.tool_calls`. Calls without a name or with
/// unparsable arguments are dropped.
pub fn extract_tool_calls(response: &Value) -> Vec<ToolCallRequest> {
    let Some(calls) = first_choice(response)
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("tool_calls"))
        .and_then(|tc| tc.as_array())
    else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|tc| {
            let func = tc.get("function")?;
            let name = func.get("name").and_then(|n| n.as_str()).filter(|n| !n.is_empty())?;
            let parameters = match func.get("arguments") {
                Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                    Ok(v) => into_object(v),
                    Err(e) => {
                        warn!(tool = %name, err = %e, "dropping tool call with unparsable arguments");
                        return None;
                    }
                },
                Some(v) => into_object(v.clone()),
                None => Map::new(),
            };
            let mut call = ToolCallRequest::new(name, parameters);
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()).filter(|id| !id.is_empty()) {
                call = call.with_call_id(id);
            }
            Some(call)
        })
        .collect()
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `choices[0].finish_reason` mapped to the canonical reason.
pub fn extract_termination(response: &Value) -> TerminationReason {
    TerminationReason::from_openai(
        first_choice(response)
            .and_then(|c| c.get("finish_reason"))
            .and_then(|r| r.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(v: Value) -> Map<String, Value> {
        into_object(v)
    }

    #[test]
    fn request_body_shape() {
        let call = ToolCallRequest::new("MusicPlay", params(json!({"query": "rock"}))).with_call_id("call_1");
        let messages = vec![
            ConversationMessage::System("sys".into()),
            ConversationMessage::User("toca rock".into()),
            ConversationMessage::Assistant {
                content: None,
                tool_calls: vec![call],
            },
            ConversationMessage::ToolResult {
                tool_name: "MusicPlay".into(),
                call_id: Some("call_1".into()),
                content: r#"{"success":true}"#.into(),
            },
        ];
        let tools = vec![ToolDefinition {
            name: "MusicPlay".into(),
            description: "Toca".into(),
            parameters: json!({"type": "object"}),
        }];

        let body = build_request_body("gpt-4o-mini", &messages, 1000, &tools);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"rock"}"#
        );
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "MusicPlay");
    }

    #[test]
    fn text_only_calls_pair_by_tool_name() {
        let assistant = message_to_json(&ConversationMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCallRequest::new("MusicSkip", Map::new())],
        });
        let result = message_to_json(&ConversationMessage::ToolResult {
            tool_name: "MusicSkip".into(),
            call_id: None,
            content: "{}".into(),
        });
        assert_eq!(assistant["tool_calls"][0]["id"], result["tool_call_id"]);
    }

    #[test]
    fn no_tools_key_without_tools() {
        let body = build_request_body("m", &[], 600, &[]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn extracts_native_calls() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "function": {"name": "MusicVolume", "arguments": "{\"volume\": 50}"}},
                        {"id": "b", "function": {"name": "MusicSkip", "arguments": "not json"}},
                        {"id": "c", "function": {"name": "MusicPause", "arguments": "[1, 2]"}},
                        {"id": "d", "function": {"arguments": "{}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let calls = extract_tool_calls(&response);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_name, "MusicVolume");
        assert_eq!(calls[0].parameters["volume"], 50);
        assert_eq!(calls[0].provider_call_id.as_deref(), Some("a"));
        assert_eq!(calls[1].tool_name, "MusicPause");
        assert!(calls[1].parameters.is_empty());
        assert_eq!(extract_content(&response), None);
        assert_eq!(extract_termination(&response), TerminationReason::ToolCalls);
    }

    #[test]
    fn unreadable_response() {
        let response = json!({"error": "boom"});
        assert_eq!(extract_content(&response), None);
        assert!(extract_tool_calls(&response).is_empty());
        assert_eq!(extract_termination(&response), TerminationReason::None);
    }
}
