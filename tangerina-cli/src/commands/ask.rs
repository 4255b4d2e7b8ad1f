use anyhow::Result;
use tracing::info;

use tangerina_core::config::TangerinaConfig;
use tangerina_core::{CallerContext, ChatRequest};

use crate::runtime::{build_orchestrator, check_config, console_capabilities};

pub async fn run_ask_command(
    config: TangerinaConfig,
    message: String,
    context: CallerContext,
    plain: bool,
) -> Result<()> {
    check_config(&config);
    let orchestrator = build_orchestrator(&config)?;
    info!(provider = %orchestrator.provider_name(), plain, "answering one message");

    if plain {
        println!("{}", orchestrator.generate_response(&message, &[]).await);
        return Ok(());
    }

    let request = ChatRequest::new(message).with_context(context);
    let outcome = orchestrator.respond(&request, &console_capabilities()).await;

    for call in &outcome.tool_calls_executed {
        let status = if call.result.success { "ok" } else { call.result.error_or_unknown() };
        eprintln!("🔧 {} → {}", call.tool, status);
    }
    if !outcome.text.is_empty() {
        println!("{}", outcome.text);
    }
    Ok(())
}
