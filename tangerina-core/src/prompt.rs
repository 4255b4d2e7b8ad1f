//! System Prompt Builder
//!
//! Assembles the message sequence for a turn: one system message holding
//! the persona, reply rules, live context ids and injected memories, then
//! the trimmed history and finally the user message.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::memory::RetrievedMemories;
use crate::types::{ConversationMessage, HistoryEntry};
use crate::validation::CallerContext;

/// History entries kept before dropping blank ones.
pub const HISTORY_WINDOW: usize = 10;

const DEFAULT_PERSONA: &str = "IDENTIDADE
- Nome: Tangerina
- Personalidade: Direto, bem-humorado, objetivo
- Idioma: Sempre português brasileiro
- Emojis: Máximo 1 por resposta quando contextual
- Tom: Positivo, descontraído, profissional quando necessário
- Criador: Bergamota";

const RULES: &str = "REGRAS DE RESPOSTA
- Responda somente em português brasileiro
- Fale sempre na primeira pessoa como Tangerina
- Máximo 1 emoji quando fizer sentido
- Resposta curta e direta

REGRAS DE FERRAMENTAS
- Use SEMPRE as ferramentas disponíveis quando precisar executar ações
- NÃO escreva o nome da ferramenta e parâmetros como texto
- Use o sistema de chamadas de ferramentas da API para executar ações
- Quando uma ferramenta for executada com sucesso, informe o usuário de forma natural";

const CONTEXT_INSTRUCTION: &str = "IMPORTANTE: Ao chamar ferramentas que requerem guild_id, channel_id ou user_id, use SEMPRE os valores do contexto atual acima. NUNCA use valores mockados ou de exemplo.";

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Character description placed at the top of the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona(String);

impl Persona {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Read a persona file. A missing file falls back to the built-in
    /// persona; any other IO error is returned.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "loaded persona");
                Ok(Self(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "persona file not found, using default");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read persona {}", path.display())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self(DEFAULT_PERSONA.to_string())
    }
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

/// Persona followed by the reply and tool rules.
pub fn build_system_text(persona: &Persona) -> String {
    format!("{}\n\n{}", persona.as_str().trim(), RULES)
        .trim()
        .to_string()
}

fn context_block(ctx: &CallerContext) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(id) = ctx.guild_id {
        lines.push(format!("ID do servidor atual (guild_id): {id}"));
    }
    if let Some(id) = ctx.channel_id {
        lines.push(format!("ID do canal atual (channel_id): {id}"));
    }
    if let Some(id) = ctx.user_id {
        lines.push(format!("ID do usuário atual (user_id): {id}"));
    }
    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "CONTEXTO ATUAL:\n{}\n\n{}",
        lines.join("\n"),
        CONTEXT_INSTRUCTION
    ))
}

fn memory_blocks(memories: &RetrievedMemories) -> Vec<String> {
    let mut blocks = Vec::new();

    if !memories.recent.is_empty() {
        let lines: Vec<String> = memories
            .recent
            .iter()
            .enumerate()
            .map(|(i, m)| {
                format!(
                    "{}. [{}] {}",
                    i + 1,
                    m.timestamp.format("%Y-%m-%dT%H:%M:%S"),
                    m.content
                )
            })
            .collect();
        blocks.push(format!(
            "MEMORIAS RECENTES (últimas 3 interações):\n{}",
            lines.join("\n")
        ));
    }

    let semantic: Vec<String> = memories
        .semantic
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| format!("- {}", m.content))
        .collect();
    if !semantic.is_empty() {
        blocks.push(format!(
            "MEMORIAS RELEVANTES DO PASSADO (baseadas em similaridade semântica):\n{}",
            semantic.join("\n")
        ));
    }

    blocks
}

/// Last [`HISTORY_WINDOW`] entries, minus non-string or blank ones.
pub fn trim_history(history: &[HistoryEntry]) -> Vec<ConversationMessage> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .filter_map(|entry| match &entry.content {
            Value::String(s) if !s.trim().is_empty() => {
                Some(ConversationMessage::User(s.trim().to_string()))
            }
            _ => None,
        })
        .collect()
}

/// Full message sequence for the first model request of a turn.
pub fn build_messages(
    persona: &Persona,
    message: &str,
    history: &[HistoryEntry],
    ctx: &CallerContext,
    memories: Option<&RetrievedMemories>,
) -> Vec<ConversationMessage> {
    let mut system = build_system_text(persona);
    if let Some(block) = context_block(ctx) {
        system.push_str("\n\n");
        system.push_str(&block);
    }
    for block in memories.map(memory_blocks).unwrap_or_default() {
        system.push_str("\n\n");
        system.push_str(&block);
    }

    let mut messages = vec![ConversationMessage::System(system)];
    messages.extend(trim_history(history));
    messages.push(ConversationMessage::User(message.trim().to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{RecentMemory, SemanticMemory};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn system_text(messages: &[ConversationMessage]) -> &str {
        match &messages[0] {
            ConversationMessage::System(s) => s,
            other => panic!("expected system message, got {other:?}"),
        }
    }

    #[test]
    fn system_text_has_persona_and_rules() {
        let text = build_system_text(&Persona::new("  Sou a Tangerina.  \n"));
        assert!(text.starts_with("Sou a Tangerina.\n\nREGRAS DE RESPOSTA"));
        assert!(text.contains("REGRAS DE FERRAMENTAS"));
    }

    #[test]
    fn context_block_only_when_ids_present() {
        let messages = build_messages(&Persona::default(), "oi", &[], &CallerContext::default(), None);
        assert!(!system_text(&messages).contains("CONTEXTO ATUAL"));

        let ctx = CallerContext::new(Some(10), None, Some(30));
        let messages = build_messages(&Persona::default(), "oi", &[], &ctx, None);
        let system = system_text(&messages);
        assert!(system.contains("CONTEXTO ATUAL:\nID do servidor atual (guild_id): 10\nID do usuário atual (user_id): 30"));
        assert!(!system.contains("channel_id): "));
        assert!(system.ends_with(CONTEXT_INSTRUCTION));
    }

    #[test]
    fn memory_sections() {
        let memories = RetrievedMemories {
            recent: vec![RecentMemory {
                content: "User: oi Bot: olá".into(),
                timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            }],
            semantic: vec![
                SemanticMemory {
                    content: "gosta de rock".into(),
                    similarity: 0.9,
                },
                SemanticMemory {
                    content: String::new(),
                    similarity: 0.1,
                },
            ],
        };
        let messages = build_messages(
            &Persona::default(),
            "oi",
            &[],
            &CallerContext::default(),
            Some(&memories),
        );
        let system = system_text(&messages);
        assert!(system.contains(
            "MEMORIAS RECENTES (últimas 3 interações):\n1. [2025-01-02T03:04:05] User: oi Bot: olá"
        ));
        assert!(system.ends_with(
            "MEMORIAS RELEVANTES DO PASSADO (baseadas em similaridade semântica):\n- gosta de rock"
        ));
    }

    #[test]
    fn empty_memories_add_nothing() {
        let with = build_messages(
            &Persona::default(),
            "oi",
            &[],
            &CallerContext::default(),
            Some(&RetrievedMemories::default()),
        );
        let without = build_messages(&Persona::default(), "oi", &[], &CallerContext::default(), None);
        assert_eq!(with, without);
    }

    #[test]
    fn history_window_applies_before_filtering() {
        let mut history: Vec<HistoryEntry> = vec![HistoryEntry::text("antiga")];
        history.extend((0..10).map(|_| HistoryEntry::text("   ")));
        assert!(trim_history(&history).is_empty());
    }

    #[test]
    fn history_drops_non_strings_and_trims() {
        let history = vec![
            HistoryEntry::text(" primeira "),
            HistoryEntry { content: json!(42) },
            HistoryEntry { content: Value::Null },
            HistoryEntry::text("segunda"),
        ];
        assert_eq!(
            trim_history(&history),
            vec![
                ConversationMessage::User("primeira".into()),
                ConversationMessage::User("segunda".into())
            ]
        );
    }

    #[test]
    fn message_order() {
        let messages = build_messages(
            &Persona::default(),
            "  toca algo  ",
            &[HistoryEntry::text("antes")],
            &CallerContext::default(),
            None,
        );
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ConversationMessage::User("antes".into()));
        assert_eq!(messages[2], ConversationMessage::User("toca algo".into()));
    }

    #[test]
    fn persona_load_falls_back_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let persona = Persona::load(&dir.path().join("nope.txt")).unwrap();
        assert_eq!(persona, Persona::default());

        let path = dir.path().join("persona.txt");
        std::fs::write(&path, "Sou outra.").unwrap();
        assert_eq!(Persona::load(&path).unwrap().as_str(), "Sou outra.");
    }
}
