pub mod ask;
pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tangerina", version = "0.1.0", about = "Tangerina: tool-calling chat bot console")]
pub struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message and print the reply
    Ask {
        /// Message text
        message: String,
        /// Guild (server) id of the conversation
        #[arg(long)]
        guild_id: Option<u64>,
        /// Channel id of the conversation
        #[arg(long)]
        channel_id: Option<u64>,
        /// User id of the sender
        #[arg(long)]
        user_id: Option<u64>,
        /// Reply without tools
        #[arg(long)]
        plain: bool,
    },
    /// Interactive chat loop over stdin
    Chat {
        #[arg(long)]
        guild_id: Option<u64>,
        #[arg(long)]
        channel_id: Option<u64>,
        #[arg(long)]
        user_id: Option<u64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a sample config file to the default location
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_ids() {
        let cli = Cli::parse_from([
            "tangerina",
            "ask",
            "toca lofi",
            "--guild-id",
            "10",
            "--channel-id",
            "20",
        ]);
        match cli.command {
            Commands::Ask {
                message,
                guild_id,
                channel_id,
                user_id,
                plain,
            } => {
                assert_eq!(message, "toca lofi");
                assert_eq!(guild_id, Some(10));
                assert_eq!(channel_id, Some(20));
                assert_eq!(user_id, None);
                assert!(!plain);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["tangerina", "config", "show", "--config", "/tmp/t.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
