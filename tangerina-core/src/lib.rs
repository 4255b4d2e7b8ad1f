//! # Tangerina Core
//!
//! Tool-calling conversation orchestrator for the Tangerina chat bot.
//! Provides the tool registry, text tool-call parsing, parameter
//! validation, capability dispatch, candidate-model fallback, prompt
//! assembly, memory hooks and the bounded tool loop.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod memory;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod types;
pub mod validation;

// Re-export key types
pub use config::TangerinaConfig;
pub use dispatch::{dispatch, CapabilityTable};
pub use error::{CapabilityError, FallbackError, RegistryError, ValidationError};
pub use fallback::request_turn;
pub use memory::{MemoryStore, RecentMemoryStore, RetrievedMemories};
pub use orchestrator::{ChatOutcome, ChatRequest, Orchestrator, OrchestratorSettings};
pub use parser::{parse_tool_calls, CallSource, ParsedCalls};
pub use prompt::Persona;
pub use provider::ChatProvider;
pub use schema::{ToolRegistry, ToolSchema};
pub use types::{
    ConversationMessage, ExecutedToolCall, HistoryEntry, ModelTurn, TerminationReason,
    ToolCallRequest, ToolDefinition, ToolResult,
};
pub use validation::{validate, CallerContext};
