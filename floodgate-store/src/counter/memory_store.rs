use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use floodgate_utils::time::now_unix_secs;

#[derive(Debug, Default)]
struct WindowEntry {
    post_ids: Vec<String>,
    expires_at: u64,
}

/// In-process fallback backend for single-instance deployments without
/// Redis. Expiry is evaluated lazily on access; an elapsed window drops
/// the whole sequence at once, never trimming it item by item.
#[derive(Clone, Debug, Default)]
pub struct MemoryWindowStore {
    entries: Arc<Mutex<HashMap<String, WindowEntry>>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_post(&self, key: &str, post_id: &str, period_seconds: u64) -> u64 {
        self.record_post_at(key, post_id, period_seconds, now_unix_secs())
    }

    pub fn first_and_rest(&self, key: &str) -> (Option<String>, Vec<String>) {
        self.first_and_rest_at(key, now_unix_secs())
    }

    fn record_post_at(&self, key: &str, post_id: &str, period_seconds: u64, now: u64) -> u64 {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = entries.entry(key.to_owned()).or_default();
        if !entry.post_ids.is_empty() && now >= entry.expires_at {
            entry.post_ids.clear();
        }

        entry.post_ids.push(post_id.to_owned());
        if entry.post_ids.len() == 1 {
            // Only the first post of a window sets the expiry.
            entry.expires_at = now.saturating_add(period_seconds);
        }

        entry.post_ids.len() as u64
    }

    fn first_and_rest_at(&self, key: &str, now: u64) -> (Option<String>, Vec<String>) {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match entries.get(key) {
            Some(entry) if !entry.post_ids.is_empty() && now < entry.expires_at => {
                let first = entry.post_ids.first().cloned();
                let rest = entry.post_ids[1..].to_vec();
                (first, rest)
            }
            _ => (None, Vec::new()),
        }
    }
}
