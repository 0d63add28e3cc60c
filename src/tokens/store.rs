//! In-memory expiring key/value store backing provisioning tokens.
//!
//! Entries are kept in a [`DashMap`] so concurrent requests only contend on
//! the shard that holds their key. Expired entries are invisible to readers
//! as soon as their deadline passes, and are physically removed either on
//! access or by [`TokenStore::purge_expired`].

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    payload: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Expiring map from token to serialized payload.
#[derive(Debug, Default)]
pub struct TokenStore {
    entries: DashMap<String, Entry>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. A zero TTL stores an entry that is
    /// already expired.
    pub fn put(&self, key: impl Into<String>, payload: impl Into<String>, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.into(), Entry { payload: payload.into(), expires_at });
    }

    /// Return the payload if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let live = self.entries.get(key).and_then(|entry| entry.is_live(now).then(|| entry.payload.clone()));

        if live.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }

        live
    }

    /// Remove `key` and return its payload in one step, only if it is still live.
    ///
    /// Of several concurrent callers with the same key at most one gets `Some`.
    pub fn take(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) if entry.is_live(now) => Some(entry.payload),
            _ => None,
        }
    }

    /// Remove `key`. Missing keys are not an error.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry and return the keys that were removed.
    pub fn purge_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut purged = Vec::new();
        self.entries.retain(|key, entry| {
            let live = entry.is_live(now);
            if !live {
                purged.push(key.clone());
            }
            live
        });
        purged
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn put_then_get_returns_payload() {
        let store = TokenStore::new();
        store.put("token", "payload", TTL);

        assert_eq!(store.get("token").as_deref(), Some("payload"));
        // get does not consume
        assert_eq!(store.get("token").as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let store = TokenStore::new();
        store.put("token", "first", TTL);
        store.put("token", "second", TTL);

        assert_eq!(store.get("token").as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = TokenStore::new();
        store.put("token", "payload", Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("token").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("token").is_none());
        assert!(store.is_empty(), "expired entry should be dropped on access");
    }

    #[tokio::test]
    async fn zero_ttl_is_immediately_expired() {
        let store = TokenStore::new();
        store.put("token", "payload", Duration::ZERO);

        assert!(store.get("token").is_none());
        assert!(store.take("token").is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = TokenStore::new();
        store.put("token", "payload", TTL);

        store.delete("token");
        store.delete("token");
        store.delete("never-existed");

        assert!(store.get("token").is_none());
    }

    #[tokio::test]
    async fn take_returns_payload_once() {
        let store = TokenStore::new();
        store.put("token", "payload", TTL);

        assert_eq!(store.take("token").as_deref(), Some("payload"));
        assert!(store.take("token").is_none());
        assert!(store.get("token").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let store = TokenStore::new();
        store.put("short", "a", Duration::from_secs(1));
        store.put("long", "b", Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        let purged = store.purge_expired();

        assert_eq!(purged, vec!["short".to_string()]);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_take_has_single_winner() {
        let store = Arc::new(TokenStore::new());
        store.put("token", "payload", TTL);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take("token").is_some() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
