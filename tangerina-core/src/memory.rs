//! Conversation Memory
//!
//! Interface to the long-term memory subsystem plus a small in-process
//! store that keeps the most recent interactions per conversation scope.
//! Memory is best-effort: callers log failures and carry on.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ExecutedToolCall;
use crate::validation::CallerContext;

/// Number of recent interactions rendered into the prompt.
pub const RECENT_LIMIT: usize = 3;

// ---------------------------------------------------------------------------
// Retrieved memories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMemory {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMemory {
    pub content: String,
    pub similarity: f32,
}

/// Memories injected into the system prompt for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemories {
    #[serde(default)]
    pub recent: Vec<RecentMemory>,
    #[serde(default)]
    pub semantic: Vec<SemanticMemory>,
}

impl RetrievedMemories {
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty() && self.semantic.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Memory store trait
// ---------------------------------------------------------------------------

/// Backend for conversation memory (hybrid recency + semantic store).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Memories relevant to `query` in the given conversation scope.
    async fn retrieve_context(&self, query: &str, ctx: &CallerContext) -> Result<RetrievedMemories>;

    /// Record one finished exchange.
    async fn store_conversation(
        &self,
        user_message: &str,
        bot_response: &str,
        ctx: &CallerContext,
        tool_calls: &[ExecutedToolCall],
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-process recent store
// ---------------------------------------------------------------------------

type Scope = (Option<u64>, Option<u64>, Option<u64>);

/// Scopes kept by default before the least recently written one is dropped.
pub const MAX_SCOPES: usize = 1024;

/// Keeps the last few exchanges per guild/channel/user in memory. Has no
/// semantic search; `semantic` is always empty. At most `max_scopes`
/// conversations are tracked.
#[derive(Debug)]
pub struct RecentMemoryStore {
    capacity: usize,
    max_scopes: usize,
    inner: Mutex<Scopes>,
}

#[derive(Debug, Default)]
struct Scopes {
    entries: HashMap<Scope, VecDeque<RecentMemory>>,
    /// Least recently written first.
    order: VecDeque<Scope>,
}

impl Scopes {
    /// Queue for `scope`, marked most recent. Evicts the stalest scope
    /// when a new one would exceed `max_scopes`.
    fn touch(&mut self, scope: Scope, max_scopes: usize) -> &mut VecDeque<RecentMemory> {
        if let Some(pos) = self.order.iter().position(|s| *s == scope) {
            self.order.remove(pos);
        } else if self.order.len() >= max_scopes {
            if let Some(stale) = self.order.pop_front() {
                self.entries.remove(&stale);
            }
        }
        self.order.push_back(scope);
        self.entries.entry(scope).or_default()
    }
}

impl RecentMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_scopes: MAX_SCOPES,
            inner: Mutex::new(Scopes::default()),
        }
    }

    pub fn with_max_scopes(mut self, max_scopes: usize) -> Self {
        self.max_scopes = max_scopes;
        self
    }

    /// Number of scopes currently held.
    pub fn scope_count(&self) -> usize {
        self.inner.lock().map(|s| s.entries.len()).unwrap_or(0)
    }
}

impl Default for RecentMemoryStore {
    fn default() -> Self {
        Self::new(RECENT_LIMIT)
    }
}

fn scope(ctx: &CallerContext) -> Scope {
    (ctx.guild_id, ctx.channel_id, ctx.user_id)
}

#[async_trait]
impl MemoryStore for RecentMemoryStore {
    async fn retrieve_context(&self, _query: &str, ctx: &CallerContext) -> Result<RetrievedMemories> {
        let scopes = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        let recent = scopes
            .entries
            .get(&scope(ctx))
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default();
        Ok(RetrievedMemories {
            recent,
            semantic: Vec::new(),
        })
    }

    async fn store_conversation(
        &self,
        user_message: &str,
        bot_response: &str,
        ctx: &CallerContext,
        _tool_calls: &[ExecutedToolCall],
    ) -> Result<()> {
        if self.capacity == 0 || self.max_scopes == 0 {
            return Ok(());
        }
        let mut scopes = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        let queue = scopes.touch(scope(ctx), self.max_scopes);
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(RecentMemory {
            content: format!("User: {user_message} Bot: {bot_response}"),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_last_interactions_per_scope() {
        let store = RecentMemoryStore::new(2);
        let here = CallerContext::new(Some(1), Some(2), Some(3));
        let elsewhere = CallerContext::new(Some(1), Some(9), Some(3));

        for i in 0..3 {
            store
                .store_conversation(&format!("q{i}"), &format!("a{i}"), &here, &[])
                .await
                .unwrap();
        }
        store.store_conversation("x", "y", &elsewhere, &[]).await.unwrap();

        let got = store.retrieve_context("q", &here).await.unwrap();
        let contents: Vec<_> = got.recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["User: q1 Bot: a1", "User: q2 Bot: a2"]);
        assert!(got.semantic.is_empty());
    }

    #[tokio::test]
    async fn stalest_scope_is_evicted() {
        let store = RecentMemoryStore::new(2).with_max_scopes(2);
        let user = |id| CallerContext::new(Some(1), Some(2), Some(id));

        store.store_conversation("a", "1", &user(10), &[]).await.unwrap();
        store.store_conversation("b", "2", &user(20), &[]).await.unwrap();
        // Writing to 10 again makes 20 the stalest.
        store.store_conversation("c", "3", &user(10), &[]).await.unwrap();
        store.store_conversation("d", "4", &user(30), &[]).await.unwrap();

        assert_eq!(store.scope_count(), 2);
        assert!(store.retrieve_context("q", &user(20)).await.unwrap().is_empty());
        let kept = store.retrieve_context("q", &user(10)).await.unwrap();
        assert_eq!(kept.recent.len(), 2);
        assert_eq!(store.retrieve_context("q", &user(30)).await.unwrap().recent.len(), 1);
    }

    #[tokio::test]
    async fn many_users_stay_bounded() {
        let store = RecentMemoryStore::default().with_max_scopes(16);
        for id in 0..500 {
            let ctx = CallerContext::new(Some(1), Some(2), Some(id));
            store.store_conversation("oi", "olá", &ctx, &[]).await.unwrap();
        }
        assert_eq!(store.scope_count(), 16);
    }

    #[tokio::test]
    async fn unknown_scope_is_empty() {
        let store = RecentMemoryStore::default();
        let got = store
            .retrieve_context("q", &CallerContext::default())
            .await
            .unwrap();
        assert!(got.is_empty());
    }
}
