use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use tangerina_core::config::TangerinaConfig;
use tangerina_core::{CallerContext, ChatRequest, HistoryEntry, RecentMemoryStore};

use crate::runtime::{build_orchestrator, check_config, console_capabilities};

pub async fn run_chat_mode(config: TangerinaConfig, context: CallerContext) -> Result<()> {
    info!(provider = %config.provider, "starting Tangerina in chat mode");
    check_config(&config);

    let orchestrator = build_orchestrator(&config)?
        .with_memory(Arc::new(RecentMemoryStore::default()));
    let capabilities = console_capabilities();
    let provider_name = orchestrator.provider_name().to_string();

    eprintln!("🍊 Tangerina v0.1.0");
    eprintln!(
        "   Provider: {} | Models: {}",
        provider_name,
        config.candidate_models(&provider_name).join(", ")
    );
    eprintln!("   Type /help for commands, /quit to exit\n");

    let mut history: Vec<HistoryEntry> = Vec::new();

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = tokio::io::AsyncBufReadExt::lines(reader);

    loop {
        eprint!("{}> ", provider_name);
        let line = match lines.next_line().await? {
            Some(l) => l.trim().to_string(),
            None => break,
        };

        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match line.as_str() {
                "/quit" | "/exit" | "/q" => {
                    eprintln!("Tchau!");
                    break;
                }
                "/help" | "/h" => {
                    eprintln!("Available commands:");
                    eprintln!("  /clear  - Forget the conversation history");
                    eprintln!("  /help   - Show this help");
                    eprintln!("  /quit   - Exit");
                }
                "/clear" => {
                    history.clear();
                    eprintln!("History cleared.");
                }
                other => eprintln!("Unknown command: {} (try /help)", other),
            }
            continue;
        }

        let request = ChatRequest::new(line.clone())
            .with_history(history.clone())
            .with_context(context);
        let outcome = orchestrator.respond(&request, &capabilities).await;

        for call in &outcome.tool_calls_executed {
            let status = if call.result.success { "ok" } else { call.result.error_or_unknown() };
            eprintln!("   🔧 {} → {}", call.tool, status);
        }
        if !outcome.text.is_empty() {
            println!("{}", outcome.text);
        }

        history.push(HistoryEntry::text(line));
    }

    Ok(())
}
