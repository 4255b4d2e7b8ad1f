//! Error Taxonomy
//!
//! Typed errors for the parts of the pipeline that callers branch on.
//! IO and HTTP edges use `anyhow` instead.

use thiserror::Error;

/// Why a tool call was rejected before dispatch. The message is fed back
/// to the model so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("{} must be an integer", capitalize(.param))]
    NotAnInteger { param: String },

    #[error("{} must be between {min} and {max}", capitalize(.param))]
    OutOfRange { param: String, min: i64, max: i64 },
}

/// Failure reported by a capability (or by argument extraction for it).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("Missing required parameter: {0}")]
    MissingKey(String),

    #[error("Invalid parameter: {0}")]
    InvalidValue(String),

    #[error("Tool execution failed: {0}")]
    Failed(String),
}

/// Every candidate model failed for one request.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("provider '{0}' has no candidate models")]
    NoCandidates(String),

    #[error("all candidate models failed: {}", .attempts.join("; "))]
    AllCandidatesFailed {
        attempts: Vec<String>,
        #[source]
        last: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Invalid tool registry contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("tool '{tool}' requires undeclared parameter '{param}'")]
    UndeclaredRequired { tool: String, param: String },
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
