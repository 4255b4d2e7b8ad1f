//! Tool Call Parser
//!
//! Extracts tool invocations from a [`ModelTurn`]. Native calls win; the
//! text fallbacks cover models that write calls into their message body
//! as `<tool_call>` XML or as `NAME {json}`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::schema::ToolRegistry;
use crate::types::{ModelTurn, ToolCallRequest};
use crate::validation::normalize_integer_ids;

// ---------------------------------------------------------------------------
// Static patterns
// ---------------------------------------------------------------------------

static XML_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>\s*(\w+)(.*?)</tool_call>").unwrap());

/// Opening tag dropped: the text starts with the tool name and a newline.
static XML_UNOPENED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A(\w+)[ \t]*\r?\n\s*(.*?)</tool_call>").unwrap());

static ARG_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<arg_key>(.*?)</arg_key>").unwrap());

static ARG_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<arg_value>(.*?)</arg_value>").unwrap());

/// `NAME\n{`, `NAME {`, `NAME: {` and `NAME{` at the start of the text.
static JSON_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A(\w+)\s*(?::\s*)?\{").unwrap());

static SALVAGE_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?s)SEND_Mensagem\s*\([^)]*text\s*=\s*"([^"]+)""#).unwrap(),
        Regex::new(r"(?s)SEND_Mensagem\s*\([^)]*text\s*=\s*'([^']+)'").unwrap(),
        Regex::new(r#"(?s)text\s*=\s*"([^"]+)""#).unwrap(),
        Regex::new(r"(?s)text\s*=\s*'([^']+)'").unwrap(),
    ]
});

const TOOL_MARKERS: [&str; 4] = ["</tool_call>", "<arg_key>", "<arg_value>", "<tool_call>"];

// ---------------------------------------------------------------------------
// Parsed calls
// ---------------------------------------------------------------------------

/// Where the calls of a turn came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    Native,
    Xml,
    Json,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCalls {
    pub calls: Vec<ToolCallRequest>,
    pub source: CallSource,
}

impl ParsedCalls {
    fn none() -> Self {
        Self {
            calls: Vec::new(),
            source: CallSource::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// True when the calls were recovered from message text.
    pub fn from_text(&self) -> bool {
        matches!(self.source, CallSource::Xml | CallSource::Json)
    }
}

/// Resolve the tool calls of a turn: native, then XML, then JSON.
pub fn parse_tool_calls(turn: &ModelTurn, registry: &ToolRegistry) -> ParsedCalls {
    if !turn.tool_calls.is_empty() {
        let mut calls = turn.tool_calls.clone();
        for call in &mut calls {
            normalize_integer_ids(registry, &call.tool_name, &mut call.parameters);
        }
        return ParsedCalls {
            calls,
            source: CallSource::Native,
        };
    }

    let Some(text) = turn.trimmed_text() else {
        return ParsedCalls::none();
    };

    let xml = parse_xml_calls(text, registry);
    if !xml.is_empty() {
        debug!(count = xml.len(), "parsed XML tool calls from text");
        return ParsedCalls {
            calls: xml,
            source: CallSource::Xml,
        };
    }

    if let Some(call) = parse_json_call(text, registry) {
        debug!(tool = %call.tool_name, "parsed JSON tool call from text");
        return ParsedCalls {
            calls: vec![call],
            source: CallSource::Json,
        };
    }

    ParsedCalls::none()
}

// ---------------------------------------------------------------------------
// XML
// ---------------------------------------------------------------------------

fn parse_xml_calls(text: &str, registry: &ToolRegistry) -> Vec<ToolCallRequest> {
    let mut calls: Vec<ToolCallRequest> = XML_BLOCK_RE
        .captures_iter(text)
        .filter(|caps| registry.contains(&caps[1]))
        .map(|caps| ToolCallRequest::new(&caps[1], parse_xml_args(&caps[2])))
        .collect();

    if calls.is_empty() {
        if let Some(caps) = XML_UNOPENED_RE.captures(text) {
            if registry.contains(&caps[1]) {
                calls.push(ToolCallRequest::new(&caps[1], parse_xml_args(&caps[2])));
            }
        }
    }
    calls
}

/// Pair `<arg_key>`/`<arg_value>` tags in order. Mismatched counts give
/// an empty map.
pub fn parse_xml_args(body: &str) -> Map<String, Value> {
    let keys: Vec<&str> = ARG_KEY_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let values: Vec<&str> = ARG_VALUE_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if keys.len() != values.len() {
        debug!(keys = keys.len(), values = values.len(), "mismatched XML argument tags");
        return Map::new();
    }

    keys.into_iter()
        .zip(values)
        .map(|(k, v)| (k.trim().to_string(), coerce_xml_value(v.trim())))
        .collect()
}

fn coerce_xml_value(value: &str) -> Value {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(value.to_string()));
    }
    if looks_decimal(value) {
        if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(value.to_string())
}

/// Digits once at most one `.` and one `-` are removed.
fn looks_decimal(value: &str) -> bool {
    let stripped = value.replacen('.', "", 1).replacen('-', "", 1);
    !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn parse_json_call(text: &str, registry: &ToolRegistry) -> Option<ToolCallRequest> {
    let caps = JSON_HEAD_RE.captures(text)?;
    let name = caps.get(1)?.as_str();
    if !registry.contains(name) {
        return None;
    }

    // Brace is the last byte of the match.
    let start = caps.get(0)?.end() - 1;
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(params))) => Some(ToolCallRequest::new(name, params)),
        Some(Ok(_)) => None,
        Some(Err(e)) => {
            debug!(tool = %name, error = %e, "JSON tool call body did not parse");
            None
        }
        None => None,
    }
}

// ---------------------------------------------------------------------------
// Markers and salvage
// ---------------------------------------------------------------------------

/// Whether the text still carries tool-call syntax.
pub fn contains_tool_markers(text: &str) -> bool {
    let lower = text.to_lowercase();
    TOOL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Recover the `text="..."` argument of a malformed message-send call.
pub fn salvage_message_text(text: &str) -> Option<String> {
    SALVAGE_RES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}
