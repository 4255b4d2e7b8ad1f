//! Tangerina CLI
//!
//! Binary entry point. Provides:
//! - `ask`: answer one message and exit
//! - `chat`: interactive loop over stdin
//! - `config`: configuration management

mod commands;
mod runtime;

use anyhow::Result;
use clap::Parser;

use tangerina_core::config::TangerinaConfig;
use tangerina_core::CallerContext;

use crate::commands::ask::run_ask_command;
use crate::commands::chat::run_chat_mode;
use crate::commands::config::run_config_command;
use crate::commands::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries replies.
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(is_tty)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("❌ Tangerina fatal error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("   caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        TangerinaConfig::load_from(path)?
    } else {
        TangerinaConfig::load_default()?
    };

    match cli.command {
        Commands::Ask {
            message,
            guild_id,
            channel_id,
            user_id,
            plain,
        } => {
            let context = CallerContext::new(guild_id, channel_id, user_id);
            run_ask_command(config, message, context, plain).await
        }
        Commands::Chat {
            guild_id,
            channel_id,
            user_id,
        } => run_chat_mode(config, CallerContext::new(guild_id, channel_id, user_id)).await,
        Commands::Config { action } => run_config_command(action, config),
    }
}
