use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::memory::MemoryCache;
use super::store::CacheStore;
use crate::core::ProviderError;

/// Cache key: provider name plus the normalized query signature. The storage
/// key keeps the provider as a plain prefix so provider-wide invalidation
/// stays a prefix/column match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    provider: String,
    signature: String,
}

impl CacheKey {
    pub fn new(provider: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            signature: signature.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn storage_key(&self) -> String {
        let digest = Sha256::digest(self.signature.as_bytes());
        format!(
            "{}:{}",
            self.provider,
            general_purpose::URL_SAFE_NO_PAD.encode(digest)
        )
    }
}

/// Two-tier cache with per-key request coalescing.
///
/// Lookup order: memory tier, then sqlite tier (repopulating memory), then
/// the supplied fetch. Successful fetches are written to both tiers before
/// the call returns; failed fetches are never cached. Concurrent callers of
/// the same key serialize on a per-key mutex, so at most one pays the fetch
/// cost while distinct keys proceed fully in parallel.
pub struct CacheLayer {
    memory: MemoryCache,
    store: CacheStore,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CacheLayer {
    pub fn new(store: CacheStore) -> Self {
        Self {
            memory: MemoryCache::new(),
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn key_lock(&self, storage_key: &str) -> Arc<Mutex<()>> {
        self.inflight
            .lock()
            .await
            .entry(storage_key.to_string())
            .or_default()
            .clone()
    }

    /// Drop the per-key lock entry once no caller besides us and the map
    /// itself holds it, so the map stays bounded by live fetches rather than
    /// growing one entry per distinct key forever.
    async fn release_key_lock(&self, storage_key: &str, lock: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(storage_key) {
            if Arc::ptr_eq(existing, lock) && Arc::strong_count(lock) == 2 {
                inflight.remove(storage_key);
            }
        }
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<(Value, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProviderError>>,
    {
        let storage_key = key.storage_key();

        // Fast path: no lock contention on a warm memory tier.
        if let Some(value) = self.memory.get(&storage_key).await {
            return Ok((value, true));
        }

        let lock = self.key_lock(&storage_key).await;
        let result = {
            let _guard = lock.lock().await;
            self.load_or_fetch(&storage_key, key, ttl, fetch).await
        };
        self.release_key_lock(&storage_key, &lock).await;
        result
    }

    async fn load_or_fetch<F, Fut>(
        &self,
        storage_key: &str,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<(Value, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProviderError>>,
    {
        // A coalesced caller that was parked on the lock finds the entry
        // the winner just wrote.
        if let Some(value) = self.memory.get(storage_key).await {
            return Ok((value, true));
        }
        if let Some((value, expires_at)) = self.store.get_fresh(storage_key).await? {
            self.memory.put(storage_key, value.clone(), expires_at).await;
            return Ok((value, true));
        }

        let value = fetch().await?;

        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(3600));
        self.memory.put(storage_key, value.clone(), expires_at).await;
        self.store
            .put(storage_key, key.provider(), &value, expires_at)
            .await?;

        Ok((value, false))
    }

    /// Expired-but-present payload from either tier, for serving stale data
    /// when a live fetch fails.
    pub async fn get_stale(&self, key: &CacheKey) -> Option<Value> {
        let storage_key = key.storage_key();
        if let Some(value) = self.memory.get_stale(&storage_key).await {
            return Some(value);
        }
        self.store.get_stale(&storage_key).await.ok().flatten()
    }

    /// Force the next `get_or_fetch` for this key to miss regardless of TTL.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let storage_key = key.storage_key();
        self.memory.remove(&storage_key).await;
        self.store.delete(&storage_key).await
    }

    /// Drop every entry belonging to one provider (manual refresh).
    pub async fn invalidate_provider(&self, provider: &str) -> Result<u64> {
        self.memory.remove_prefix(&format!("{provider}:")).await;
        self.store.delete_provider(provider).await
    }
}
