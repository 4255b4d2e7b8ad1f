//! Conversation Orchestrator
//!
//! Bounded tool loop for one inbound message: build the prompt, ask the
//! model, run requested tools through validation and dispatch, feed the
//! results back and decide what text (if any) reaches the user.
//!
//! The public entry points never fail. Provider outages become a fixed
//! apology, tool problems are fed back to the model, and an exhausted
//! iteration budget yields a generic reply.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::dispatch::{dispatch, CapabilityTable};
use crate::fallback::request_turn;
use crate::memory::{MemoryStore, RetrievedMemories};
use crate::parser::{contains_tool_markers, parse_tool_calls, salvage_message_text, CallSource};
use crate::prompt::{build_messages, Persona};
use crate::schema::{ToolRegistry, ENTER_CHANNEL_TOOL, SEND_MESSAGE_TOOL};
use crate::types::{
    ConversationMessage, ExecutedToolCall, HistoryEntry, TerminationReason, ToolCallRequest,
    ToolDefinition, ToolResult,
};
use crate::provider::ChatProvider;
use crate::validation::{validate, CallerContext};

pub const ASK_AGAIN_REPLY: &str = "Manda a pergunta de novo pra mim, por favor.";
pub const APOLOGY_REPLY: &str = "Deu ruim aqui do meu lado. Tenta de novo em instantes.";
pub const ACTION_DONE_REPLY: &str = "Ação executada.";
pub const FAILURE_REPLY: &str = "Tive um problema pra responder agora. Tenta de novo?";

const TEXT_CALL_SUCCESS_REPLY: &str = "Ação executada com sucesso!";

// ---------------------------------------------------------------------------
// Settings, requests and outcomes
// ---------------------------------------------------------------------------

/// Limits for one orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Model requests per message before giving up (default 10).
    pub max_iterations: usize,
    /// Output token budget per tool-loop request (default 1000).
    pub max_tokens: u32,
    /// Output token budget for plain replies without tools (default 600).
    pub plain_max_tokens: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_tokens: 1000,
            plain_max_tokens: 600,
        }
    }
}

/// One inbound user message and its surroundings.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub context: CallerContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: CallerContext) -> Self {
        self.context = context;
        self
    }
}

/// Final reply plus every tool call attempted along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    /// Text for the user. Empty when a capability already sent the reply.
    pub text: String,
    pub tool_calls_executed: Vec<ExecutedToolCall>,
    /// Model requests made.
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// Per-invocation state
// ---------------------------------------------------------------------------

struct TurnState {
    messages: Vec<ConversationMessage>,
    executed: Vec<ExecutedToolCall>,
    /// A message-send capability succeeded during this invocation.
    sent_any: bool,
    sent_texts: Vec<String>,
}

impl TurnState {
    fn new(messages: Vec<ConversationMessage>) -> Self {
        Self {
            messages,
            executed: Vec::new(),
            sent_any: false,
            sent_texts: Vec::new(),
        }
    }

    fn joined_sent_texts(&self) -> String {
        self.sent_texts.join(" ")
    }

    /// Reply for an empty turn that ended with `stop`, if one applies.
    fn reply_for_empty_stop(&self) -> Option<String> {
        if self.sent_any {
            Some(self.joined_sent_texts())
        } else if !self.executed.is_empty() {
            Some(ACTION_DONE_REPLY.to_string())
        } else {
            None
        }
    }

    fn finish(self, text: impl Into<String>, iterations: usize) -> ChatOutcome {
        ChatOutcome {
            text: text.into(),
            tool_calls_executed: self.executed,
            iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one provider through the tool loop. Cheap to share; holds no
/// per-conversation state.
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    persona: Persona,
    memory: Option<Arc<dyn MemoryStore>>,
    settings: OrchestratorSettings,
    tools: Vec<ToolDefinition>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ChatProvider>, registry: Arc<ToolRegistry>, persona: Persona) -> Self {
        let tools = registry.definitions();
        Self {
            provider,
            registry,
            persona,
            memory: None,
            settings: OrchestratorSettings::default(),
            tools,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Retrieve memories, run the tool loop and store the exchange.
    pub async fn respond(&self, request: &ChatRequest, capabilities: &CapabilityTable) -> ChatOutcome {
        let memories = match &self.memory {
            Some(store) if !request.message.trim().is_empty() => {
                match store.retrieve_context(&request.message, &request.context).await {
                    Ok(memories) => Some(memories),
                    Err(e) => {
                        warn!(err = %e, "memory retrieval failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let outcome = self
            .generate_response_with_tools(request, capabilities, memories.as_ref())
            .await;

        if let Some(store) = &self.memory {
            if !request.message.trim().is_empty() {
                if let Err(e) = store
                    .store_conversation(
                        request.message.trim(),
                        &outcome.text,
                        &request.context,
                        &outcome.tool_calls_executed,
                    )
                    .await
                {
                    warn!(err = %e, "memory storage failed");
                }
            }
        }
        outcome
    }

    /// Run the tool loop for one message.
    pub async fn generate_response_with_tools(
        &self,
        request: &ChatRequest,
        capabilities: &CapabilityTable,
        memories: Option<&RetrievedMemories>,
    ) -> ChatOutcome {
        if request.message.trim().is_empty() {
            return TurnState::new(Vec::new()).finish(ASK_AGAIN_REPLY, 0);
        }

        let ctx = &request.context;
        let mut state = TurnState::new(build_messages(
            &self.persona,
            &request.message,
            &request.history,
            ctx,
            memories,
        ));
        let mut iterations = 0;

        while iterations < self.settings.max_iterations {
            iterations += 1;
            debug!(
                iteration = iterations,
                message_count = state.messages.len(),
                "requesting model turn"
            );

            let turn = match request_turn(
                self.provider.as_ref(),
                &state.messages,
                self.settings.max_tokens,
                &self.tools,
            )
            .await
            {
                Ok(turn) => turn,
                Err(e) => {
                    error!(provider = self.provider.name(), err = %e, "model request failed");
                    return state.finish(APOLOGY_REPLY, iterations);
                }
            };

            let parsed = parse_tool_calls(&turn, &self.registry);
            if parsed.source == CallSource::Native {
                info!(
                    iteration = iterations,
                    tool_call_count = parsed.calls.len(),
                    "executing native tool calls"
                );
                for call in &parsed.calls {
                    self.execute_call(call, ctx, capabilities, &mut state).await;
                }
                continue;
            }

            let Some(content) = turn.trimmed_text() else {
                if turn.termination == TerminationReason::Stop {
                    if let Some(reply) = state.reply_for_empty_stop() {
                        return state.finish(reply, iterations);
                    }
                }
                debug!(termination = ?turn.termination, "model turn had no content");
                break;
            };

            if parsed.from_text() {
                info!(
                    tool_call_count = parsed.calls.len(),
                    source = ?parsed.source,
                    "executing tool calls parsed from text"
                );
                let reply = self
                    .run_text_calls(&parsed.calls, ctx, capabilities, &mut state)
                    .await;
                return state.finish(reply, iterations);
            }

            if contains_tool_markers(content) {
                debug!("discarding unparsable tool-call text");
                let reply = if state.sent_any { "" } else { ACTION_DONE_REPLY };
                return state.finish(reply, iterations);
            }

            if state.sent_any && state.sent_texts.iter().any(|t| t == content) {
                debug!("model repeated an already sent message");
                let reply = state.joined_sent_texts();
                return state.finish(reply, iterations);
            }

            match turn.termination {
                TerminationReason::ToolCalls => {
                    warn!("termination is tool_calls but no tool calls were found");
                    break;
                }
                TerminationReason::Length => {
                    warn!("model response truncated by length limit");
                    let reply = salvage_message_text(content).unwrap_or_else(|| content.to_string());
                    return state.finish(reply, iterations);
                }
                _ => {
                    let reply = salvage_message_text(content).unwrap_or_else(|| content.to_string());
                    return state.finish(reply, iterations);
                }
            }
        }

        if iterations >= self.settings.max_iterations {
            warn!(
                iterations,
                max = self.settings.max_iterations,
                "tool loop hit iteration limit"
            );
        }
        if state.executed.is_empty() {
            state.finish(FAILURE_REPLY, iterations)
        } else {
            state.finish(ACTION_DONE_REPLY, iterations)
        }
    }

    /// Single request without tools, for plain chat.
    pub async fn generate_response(&self, message: &str, history: &[HistoryEntry]) -> String {
        if message.trim().is_empty() {
            return ASK_AGAIN_REPLY.to_string();
        }
        let messages = build_messages(
            &self.persona,
            message,
            history,
            &CallerContext::default(),
            None,
        );
        match request_turn(
            self.provider.as_ref(),
            &messages,
            self.settings.plain_max_tokens,
            &[],
        )
        .await
        {
            Ok(turn) => turn
                .trimmed_text()
                .map(String::from)
                .unwrap_or_else(|| FAILURE_REPLY.to_string()),
            Err(e) => {
                error!(provider = self.provider.name(), err = %e, "model request failed");
                APOLOGY_REPLY.to_string()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tool execution
    // -----------------------------------------------------------------------

    /// Validate, dispatch and record one call.
    async fn execute_call(
        &self,
        call: &ToolCallRequest,
        ctx: &CallerContext,
        capabilities: &CapabilityTable,
        state: &mut TurnState,
    ) -> ToolResult {
        let tool = call.tool_name.as_str();
        let (params, result) = match validate(&self.registry, tool, call.parameters.clone(), ctx) {
            Ok(params) => {
                let result = dispatch(tool, &params, &self.registry, capabilities).await;
                (params, result)
            }
            Err(e) => {
                warn!(tool = %tool, err = %e, "tool call rejected");
                (call.parameters.clone(), ToolResult::failure(e.to_string()))
            }
        };

        info!(tool = %tool, success = result.success, "tool call finished");

        if tool == SEND_MESSAGE_TOOL && result.success {
            state.sent_any = true;
            let text = match params.get("text") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            if !text.is_empty() {
                state.sent_texts.push(text);
            }
        }

        state.messages.push(ConversationMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCallRequest {
                tool_name: call.tool_name.clone(),
                parameters: params.clone(),
                provider_call_id: call.provider_call_id.clone(),
            }],
        });
        state.messages.push(ConversationMessage::ToolResult {
            tool_name: call.tool_name.clone(),
            call_id: call.provider_call_id.clone(),
            content: result.to_json().to_string(),
        });
        state.executed.push(ExecutedToolCall {
            tool: call.tool_name.clone(),
            parameters: params,
            result: result.clone(),
        });
        result
    }

    /// Execute calls recovered from text and synthesize the reply. Stops
    /// at the first failure.
    async fn run_text_calls(
        &self,
        calls: &[ToolCallRequest],
        ctx: &CallerContext,
        capabilities: &CapabilityTable,
        state: &mut TurnState,
    ) -> String {
        let mut reply = String::new();
        for call in calls {
            let result = self.execute_call(call, ctx, capabilities, state).await;
            if !result.success {
                return format!("Erro ao executar ação: {}", result.error_or_unknown());
            }
            reply = match call.tool_name.as_str() {
                ENTER_CHANNEL_TOOL => {
                    let channel = result
                        .data
                        .get("channel_name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("canal");
                    format!("Entrei no canal {channel}!")
                }
                SEND_MESSAGE_TOOL => state.joined_sent_texts(),
                _ => TEXT_CALL_SUCCESS_REPLY.to_string(),
            };
        }
        reply
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
