//! Short-lived response cache keyed by (language, normalized question).

use crate::config::CacheConfig;
use crate::language::Language;
use crate::reply::Reply;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    reply: Reply,
    created_at: DateTime<Utc>,
}

/// TTL cache of fully assembled replies.
///
/// Entries are never updated in place; a recomputation overwrites the entry
/// wholesale. Expired entries are dropped lazily on lookup and eagerly by
/// the periodic sweep task.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<(Language, String), CacheEntry>>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_secs(config.ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Normalized cache key for a question.
    fn normalize(question: &str) -> String {
        question.trim().to_lowercase()
    }

    /// Look up a reply within its TTL.
    pub fn get(&self, language: Language, question: &str) -> Option<Reply> {
        let key = (language, Self::normalize(question));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(entry) if !self.is_expired(entry) => Some(entry.reply.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a reply, overwriting any previous entry for the key.
    pub fn put(&self, language: Language, question: &str, reply: Reply) {
        let key = (language, Self::normalize(question));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                reply,
                created_at: Utc::now(),
            },
        );
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        let age = Utc::now().signed_duration_since(entry.created_at);
        age.to_std().map_or(true, |age| age > self.ttl)
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        before - entries.len()
    }

    /// Run the periodic sweep until cancelled.
    pub async fn run_sweeper(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let dropped = self.sweep();
                    if dropped > 0 {
                        debug!("cache sweep dropped {dropped} expired entries");
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn put_with_age(&self, language: Language, question: &str, reply: Reply, age: Duration) {
        let key = (language, Self::normalize(question));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                reply,
                created_at: Utc::now() - chrono::Duration::from_std(age).unwrap_or_default(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::reply::{Animation, FacialExpression, Utterance};

    fn sample_reply(text: &str) -> Reply {
        Reply::from_messages(vec![Utterance::new(
            text,
            FacialExpression::Default,
            Animation::Idle,
        )])
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(&CacheConfig {
            ttl_secs: 300,
            sweep_interval_secs: 60,
        })
    }

    #[test]
    fn hit_returns_the_stored_reply_verbatim() {
        let cache = cache();
        let reply = sample_reply("cached answer");
        cache.put(Language::English, "Hello", reply.clone());

        let hit = cache.get(Language::English, "hello ").unwrap();
        assert_eq!(
            serde_json::to_string(&hit).unwrap(),
            serde_json::to_string(&reply).unwrap()
        );
    }

    #[test]
    fn key_includes_the_language() {
        let cache = cache();
        cache.put(Language::English, "hello", sample_reply("english"));
        assert!(cache.get(Language::Hindi, "hello").is_none());
    }

    #[test]
    fn expired_entries_miss_and_sweep_drops_them() {
        let cache = cache();
        cache.put_with_age(
            Language::English,
            "old",
            sample_reply("stale"),
            Duration::from_secs(301),
        );
        cache.put(Language::English, "new", sample_reply("fresh"));

        assert!(cache.get(Language::English, "old").is_none());
        cache.put_with_age(
            Language::English,
            "old",
            sample_reply("stale"),
            Duration::from_secs(301),
        );
        assert_eq!(cache.sweep(), 1);
        assert!(cache.get(Language::English, "new").is_some());
    }
}
