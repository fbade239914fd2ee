//! Bounded, expiring conversation memory for the narrator.
//!
//! The caller owns the store and passes `now` explicitly, so expiry is
//! deterministic under test.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::io::config::ConversationConfig;
use crate::io::generator::ChatTurn;

#[derive(Debug)]
struct Conversation {
    turns: VecDeque<ChatTurn>,
    last_touched: Instant,
}

#[derive(Debug)]
pub struct ConversationStore {
    max_sessions: usize,
    max_turns: usize,
    ttl: Duration,
    entries: HashMap<String, Conversation>,
}

impl ConversationStore {
    pub fn new(max_sessions: usize, max_turns: usize, ttl: Duration) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            max_turns: max_turns.max(1),
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &ConversationConfig) -> Self {
        Self::new(
            cfg.max_sessions,
            cfg.max_turns,
            Duration::from_secs(cfg.ttl_secs),
        )
    }

    /// Turns recorded for `key`, oldest first. Expired conversations read as empty.
    pub fn turns(&mut self, key: &str, now: Instant) -> Vec<ChatTurn> {
        self.evict_expired(now);
        self.entries
            .get(key)
            .map(|conv| conv.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, dropping the oldest turn past `max_turns` and the
    /// least recently touched conversation past `max_sessions`.
    pub fn push(&mut self, key: &str, turn: ChatTurn, now: Instant) {
        self.evict_expired(now);
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_sessions {
            self.evict_oldest();
        }
        let conv = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Conversation {
                turns: VecDeque::new(),
                last_touched: now,
            });
        conv.turns.push_back(turn);
        while conv.turns.len() > self.max_turns {
            conv.turns.pop_front();
        }
        conv.last_touched = now;
    }

    pub fn forget(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop conversations idle for longer than the TTL; returns how many went.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, conv| now.saturating_duration_since(conv.last_touched) <= ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "expired conversations dropped");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, conv)| conv.last_touched)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!(key = %key, "conversation store full, evicting oldest");
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::generator::Role;

    fn turn(text: &str) -> ChatTurn {
        ChatTurn {
            role: Role::Assistant,
            content: text.to_string(),
        }
    }

    #[test]
    fn keeps_only_recent_turns() {
        let now = Instant::now();
        let mut store = ConversationStore::new(4, 2, Duration::from_secs(60));
        store.push("a", turn("one"), now);
        store.push("a", turn("two"), now);
        store.push("a", turn("three"), now);
        let contents: Vec<_> = store
            .turns("a", now)
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[test]
    fn idle_conversation_expires() {
        let start = Instant::now();
        let mut store = ConversationStore::new(4, 4, Duration::from_secs(10));
        store.push("a", turn("hello"), start);
        assert_eq!(store.turns("a", start + Duration::from_secs(10)).len(), 1);
        assert!(store.turns("a", start + Duration::from_secs(11)).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn full_store_evicts_least_recently_touched() {
        let start = Instant::now();
        let mut store = ConversationStore::new(2, 4, Duration::from_secs(600));
        store.push("a", turn("1"), start);
        store.push("b", turn("2"), start + Duration::from_secs(1));
        store.push("a", turn("3"), start + Duration::from_secs(2));
        store.push("c", turn("4"), start + Duration::from_secs(3));
        let now = start + Duration::from_secs(3);
        assert_eq!(store.len(), 2);
        assert!(store.turns("b", now).is_empty());
        assert_eq!(store.turns("a", now).len(), 2);
    }

    #[test]
    fn forget_drops_conversation() {
        let now = Instant::now();
        let mut store = ConversationStore::new(2, 2, Duration::from_secs(5));
        store.push("a", turn("x"), now);
        store.forget("a");
        assert!(store.turns("a", now).is_empty());
    }
}
