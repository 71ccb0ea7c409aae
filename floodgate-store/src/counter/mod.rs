//! Fixed-window, per-author post counter.
//!
//! Each author maps to an ordered list of submission IDs. The first post
//! inside a fresh window sets the window's expiry; subsequent posts only
//! append. When the expiry elapses the whole list is discarded at once,
//! so a later post starts a brand-new window of length 1.

mod memory_store;
mod redis_store;

use memory_store::MemoryWindowStore;
use redis_store::RedisWindowStore;

#[derive(Clone, Debug)]
enum CounterBackend {
    Memory(MemoryWindowStore),
    Redis(RedisWindowStore),
}

/// Shared counting handle passed across crates.
#[derive(Clone, Debug)]
pub struct WindowStore {
    key_prefix: String,
    backend: CounterBackend,
}

impl WindowStore {
    /// In-process counter for single-instance deployments and tests.
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            backend: CounterBackend::Memory(MemoryWindowStore::new()),
        }
    }

    pub fn redis(redis_url: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            key_prefix: prefix.into(),
            backend: CounterBackend::Redis(RedisWindowStore::from_url(redis_url)?),
        })
    }

    pub fn is_redis(&self) -> bool {
        matches!(self.backend, CounterBackend::Redis(_))
    }

    fn key(&self, author: &str) -> String {
        format!("{}:{}", self.key_prefix, author)
    }

    /// Append a post to the author's window and return the new count.
    ///
    /// The append and the conditional expiry are one atomic operation on
    /// the backend. This is the sole mutating entry point; a post whose
    /// count cannot be recorded has not been evaluated, and the error must
    /// reach the supervisory loop.
    pub async fn record_post(
        &self,
        author: &str,
        post_id: &str,
        period_seconds: u64,
    ) -> anyhow::Result<u64> {
        let key = self.key(author);
        match &self.backend {
            CounterBackend::Memory(store) => Ok(store.record_post(&key, post_id, period_seconds)),
            CounterBackend::Redis(store) => store.record_post(&key, post_id, period_seconds).await,
        }
    }

    /// The oldest tracked post ID and the ordered remainder.
    ///
    /// Read-only; only consulted after a threshold has been crossed.
    pub async fn first_and_rest(
        &self,
        author: &str,
    ) -> anyhow::Result<(Option<String>, Vec<String>)> {
        let key = self.key(author);
        match &self.backend {
            CounterBackend::Memory(store) => Ok(store.first_and_rest(&key)),
            CounterBackend::Redis(store) => store.first_and_rest(&key).await,
        }
    }

    /// Health probe used at startup.
    pub async fn ping(&self) -> anyhow::Result<()> {
        match &self.backend {
            CounterBackend::Memory(_) => Ok(()),
            CounterBackend::Redis(store) => store.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WindowStore;

    #[test]
    fn keys_are_prefixed_per_author() {
        let store = WindowStore::in_memory("floodgate:test");
        assert_eq!(store.key("alice"), "floodgate:test:alice");
    }

    #[tokio::test]
    async fn memory_backend_round_trip() {
        let store = WindowStore::in_memory("floodgate:test");

        assert_eq!(store.record_post("alice", "p1", 3_600).await.unwrap(), 1);
        assert_eq!(store.record_post("alice", "p2", 3_600).await.unwrap(), 2);

        let (first, rest) = store.first_and_rest("alice").await.unwrap();
        assert_eq!(first.as_deref(), Some("p1"));
        assert_eq!(rest, vec!["p2".to_owned()]);
    }

    #[tokio::test]
    async fn memory_backend_always_pings() {
        let store = WindowStore::in_memory("floodgate:test");
        assert!(store.ping().await.is_ok());
    }
}
