//! Tool Dispatcher
//!
//! Resolves a tool's call descriptor (target capability key plus the
//! positional argument order) from the registry and invokes the capability
//! from a table the embedding application supplies per conversation turn.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::error::CapabilityError;
use crate::schema::{ToolRegistry, WEB_SEARCH_TOOL};
use crate::types::ToolResult;

// ---------------------------------------------------------------------------
// Capability table
// ---------------------------------------------------------------------------

/// An application capability. Receives positional arguments and returns
/// a result object with at least a `success` key.
pub type CapabilityFn =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, CapabilityError>> + Send + Sync>;

/// Capability key → function, built fresh for each conversation turn.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    functions: HashMap<String, CapabilityFn>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure under `key`.
    pub fn insert<F, Fut>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
    {
        let boxed: CapabilityFn = Arc::new(move |args| Box::pin(f(args)));
        self.functions.insert(key.into(), boxed);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<F, Fut>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
    {
        self.insert(key, f);
        self
    }

    pub fn get(&self, key: &str) -> Option<&CapabilityFn> {
        self.functions.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.functions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.functions.keys().collect();
        keys.sort();
        f.debug_struct("CapabilityTable").field("keys", &keys).finish()
    }
}

// ---------------------------------------------------------------------------
// Call descriptors
// ---------------------------------------------------------------------------

/// How one positional argument is pulled from the validated parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgSpec {
    Int(&'static str),
    Str(&'static str),
    /// Integer or `null` when absent.
    OptInt(&'static str),
    OptStr(&'static str, &'static str),
    OptBool(&'static str, bool),
    OptIntDefault(&'static str, i64),
}

/// Where a tool's call goes: the capability key and the positional
/// argument order. Attached to each [`ToolSchema`](crate::schema::ToolSchema).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallDescriptor {
    pub capability: &'static str,
    pub args: &'static [ArgSpec],
}

impl CallDescriptor {
    pub const fn new(capability: &'static str, args: &'static [ArgSpec]) -> Self {
        Self { capability, args }
    }
}

/// Extract the positional arguments for `descriptor`.
pub fn extract_args(
    descriptor: &CallDescriptor,
    params: &Map<String, Value>,
) -> Result<Vec<Value>, CapabilityError> {
    descriptor
        .args
        .iter()
        .map(|spec| extract_arg(spec, params))
        .collect()
}

fn extract_arg(spec: &ArgSpec, params: &Map<String, Value>) -> Result<Value, CapabilityError> {
    let present = |name: &str| params.get(name).filter(|v| !v.is_null());
    match *spec {
        ArgSpec::Int(name) => {
            let v = params
                .get(name)
                .ok_or_else(|| CapabilityError::MissingKey(name.to_string()))?;
            as_int(name, v)
        }
        ArgSpec::Str(name) => {
            let v = params
                .get(name)
                .ok_or_else(|| CapabilityError::MissingKey(name.to_string()))?;
            Ok(Value::String(as_str(v)))
        }
        ArgSpec::OptInt(name) => present(name).map_or(Ok(Value::Null), |v| as_int(name, v)),
        ArgSpec::OptStr(name, default) => Ok(Value::String(
            present(name).map_or_else(|| default.to_string(), as_str),
        )),
        ArgSpec::OptBool(name, default) => match present(name) {
            None => Ok(Value::Bool(default)),
            Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Some(other) => Err(CapabilityError::InvalidValue(format!(
                "{name} must be a boolean, got {other}"
            ))),
        },
        ArgSpec::OptIntDefault(name, default) => {
            present(name).map_or(Ok(Value::from(default)), |v| as_int(name, v))
        }
    }
}

fn as_int(name: &str, v: &Value) -> Result<Value, CapabilityError> {
    let parsed = match v {
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(v.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .map(Value::from)
                .or_else(|_| s.parse::<i64>().map(Value::from))
                .ok()
        }
        _ => None,
    };
    parsed.ok_or_else(|| {
        CapabilityError::InvalidValue(format!("{name} must be an integer, got {v}"))
    })
}

fn as_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Invoke the capability behind `tool`. Never fails: every problem is
/// reported as a failed [`ToolResult`].
pub async fn dispatch(
    tool: &str,
    params: &Map<String, Value>,
    registry: &ToolRegistry,
    capabilities: &CapabilityTable,
) -> ToolResult {
    let Some(schema) = registry.get(tool) else {
        return ToolResult::failure(format!("Unknown tool: {tool}"));
    };
    let Some(descriptor) = schema.call else {
        info!(tool = %tool, "tool has no call descriptor");
        return ToolResult::failure("Function not available");
    };

    if tool == WEB_SEARCH_TOOL {
        let query = params.get("query").map(as_str).unwrap_or_default();
        if query.trim().is_empty() {
            return ToolResult::failure("Query cannot be empty");
        }
    }

    let args = match extract_args(&descriptor, params) {
        Ok(args) => args,
        Err(e) => {
            debug!(tool = %tool, error = %e, "argument extraction failed");
            return ToolResult::failure(e.to_string());
        }
    };

    let Some(function) = capabilities.get(descriptor.capability) else {
        info!(tool = %tool, capability = descriptor.capability, "capability not available");
        return ToolResult::failure("Function not available");
    };

    let mut result = match function(args).await {
        Ok(value) => ToolResult::from_value(value),
        Err(e) => {
            error!(tool = %tool, error = %e, "capability failed");
            ToolResult::failure(e.to_string())
        }
    };

    if tool == WEB_SEARCH_TOOL && !result.success {
        result.error.get_or_insert_with(|| "Search failed".to_string());
        result
            .data
            .entry("results")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    result
}
