//! Candidate Model Fallback
//!
//! Tries each candidate model of a provider in priority order and returns
//! the first turn that comes back. Candidates run one at a time since
//! they usually share a rate limit.

use tracing::{debug, info, warn};

use crate::error::FallbackError;
use crate::provider::ChatProvider;
use crate::types::{ConversationMessage, ModelTurn, ToolDefinition};

/// Request one model turn, falling back across candidate models.
pub async fn request_turn(
    provider: &dyn ChatProvider,
    messages: &[ConversationMessage],
    max_tokens: u32,
    tools: &[ToolDefinition],
) -> Result<ModelTurn, FallbackError> {
    let candidates = provider.models_to_try();
    let mut attempts = Vec::with_capacity(candidates.len());
    let mut last_error: Option<anyhow::Error> = None;

    for (index, model) in candidates.iter().enumerate() {
        debug!(provider = provider.name(), model = %model, "requesting model turn");
        match provider.make_request(model, messages, max_tokens, tools).await {
            Ok(raw) => {
                if index > 0 {
                    info!(
                        provider = provider.name(),
                        model = %model,
                        failed_before = index,
                        "fallback model succeeded"
                    );
                }
                return Ok(provider.normalize(&raw));
            }
            Err(e) => {
                warn!(provider = provider.name(), model = %model, err = %e, "model request failed");
                attempts.push(format!("{model}: {e}"));
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last) => Err(FallbackError::AllCandidatesFailed {
            attempts,
            last: last.into(),
        }),
        None => Err(FallbackError::NoCandidates(provider.name().to_string())),
    }
}
