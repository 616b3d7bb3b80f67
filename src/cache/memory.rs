use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: Value,
    expires_at: DateTime<Utc>,
}

/// In-process cache tier. Expired entries stop being served as hits but are
/// retained until overwritten or invalidated, so the aggregator can fall
/// back to them when a live fetch fails.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh hit or nothing.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at > Utc::now() {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// The stored payload regardless of expiry, for stale-serve fallback.
    pub async fn get_stale(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|e| e.payload.clone())
    }

    pub async fn put(&self, key: &str, payload: Value, expires_at: DateTime<Utc>) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), MemoryEntry { payload, expires_at });
    }

    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn remove_prefix(&self, prefix: &str) {
        self.entries
            .write()
            .await
            .retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_fresh_entry_hits() {
        let cache = MemoryCache::new();
        cache
            .put("k", json!({"a": 1}), Utc::now() + Duration::seconds(60))
            .await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_expired_entry_misses_but_stays_stale() {
        let cache = MemoryCache::new();
        cache
            .put("k", json!([1, 2]), Utc::now() - Duration::seconds(1))
            .await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.get_stale("k").await, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_remove_prefix() {
        let cache = MemoryCache::new();
        let later = Utc::now() + Duration::seconds(60);
        cache.put("zillow:1", json!(1), later).await;
        cache.put("zillow:2", json!(2), later).await;
        cache.put("loopnet:1", json!(3), later).await;
        cache.remove_prefix("zillow:").await;
        assert_eq!(cache.get("zillow:1").await, None);
        assert_eq!(cache.get_stale("zillow:2").await, None);
        assert_eq!(cache.get("loopnet:1").await, Some(json!(3)));
    }
}
