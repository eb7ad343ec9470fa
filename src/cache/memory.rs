//! In-Memory Cache Module
//!
//! A `HashMap`-backed implementation of [`Cache`] with native per-key
//! expiry. It stores the same encoded bytes the Redis backend writes, so
//! both go through identical encode/decode and expiration paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::info::parse_info;
use crate::cache::pattern::glob_to_regex;
use crate::cache::{Cache, CacheItem, KeyspaceStats, OpContext};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_lazy_delete;

// == Stored Value ==
/// Encoded item plus the backend-level expiry instant.
#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    /// Expired once the expiry instant has been reached.
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, StoredValue>,
    stats: KeyspaceStats,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CacheError::Backend("memory cache is closed".to_string()));
        }
        Ok(())
    }

    /// Removes `key` if its backend expiry has passed.
    fn purge_if_expired(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|v| v.is_expired(now)) {
            self.entries.remove(key);
            self.stats.record_expired(1);
        }
    }

    /// Returns the stored bytes for a live key, recording a hit or miss.
    fn lookup(&mut self, key: &str, now: Instant) -> Option<Vec<u8>> {
        self.purge_if_expired(key, now);
        match self.entries.get(key) {
            Some(stored) => {
                self.stats.record_hit();
                Some(stored.data.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Writes `data` with a backend expiry of `ttl`; a zero TTL removes the key.
    fn put(&mut self, key: String, data: Vec<u8>, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.remove(&key);
            return;
        }
        let expires_at = Instant::now().checked_add(ttl);
        self.entries.insert(key, StoredValue { data, expires_at });
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    fn cleanup_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired(now));
        let removed = before - self.entries.len();
        self.stats.record_expired(removed);
        removed
    }
}

// == Memory Cache ==
/// In-process backing store, mainly for tests and single-node development.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches a detached delete of `keys`.
    fn lazy_delete(&self, keys: Vec<String>) {
        let state = Arc::clone(&self.state);
        let doomed = keys.clone();
        spawn_lazy_delete(keys, async move {
            let mut state = state.write().await;
            state.ensure_open()?;
            let removed = doomed
                .iter()
                .filter(|key| state.entries.remove(key.as_str()).is_some())
                .count();
            state.stats.record_expired(removed);
            Ok(())
        });
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, ctx: &OpContext, key: &str, value: Value, ttl: Duration) -> Result<()> {
        ctx.run(async {
            let item = CacheItem::new(key, value, ttl);
            let data = item.to_bytes().map_err(|err| {
                warn!(key, error = %err, "failed to encode cache item");
                CacheError::from(err)
            })?;

            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.put(key.to_string(), data, item.ttl);

            debug!(key, ?ttl, "cache item set");
            Ok(())
        })
        .await
    }

    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<CacheItem>> {
        ctx.run(async {
            let data = {
                let mut state = self.state.write().await;
                state.ensure_open()?;
                match state.lookup(key, Instant::now()) {
                    Some(data) => data,
                    None => return Ok(None),
                }
            };

            let item = CacheItem::from_bytes(&data).map_err(|err| {
                warn!(key, error = %err, "failed to decode cache item");
                CacheError::from(err)
            })?;

            if item.is_expired() {
                debug!(key, "cache item expired, removing");
                self.lazy_delete(vec![key.to_string()]);
                return Ok(None);
            }

            Ok(Some(item))
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.entries.remove(key);
            debug!(key, "cache item deleted");
            Ok(())
        })
        .await
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.purge_if_expired(key, Instant::now());
            Ok(state.entries.contains_key(key))
        })
        .await
    }

    async fn set_multiple(&self, ctx: &OpContext, items: HashMap<String, CacheItem>) -> Result<()> {
        ctx.run(async {
            let mut encoded = Vec::with_capacity(items.len());
            for (key, item) in &items {
                match item.to_bytes() {
                    Ok(data) => encoded.push((key.clone(), data, item.ttl)),
                    Err(err) => warn!(key = %key, error = %err, "skipping unencodable cache item"),
                }
            }

            let mut state = self.state.write().await;
            state.ensure_open()?;
            let count = encoded.len();
            for (key, data, ttl) in encoded {
                state.put(key, data, ttl);
            }

            debug!(count, "multiple cache items set");
            Ok(())
        })
        .await
    }

    async fn get_multiple(
        &self,
        ctx: &OpContext,
        keys: &[String],
    ) -> Result<HashMap<String, CacheItem>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        ctx.run(async {
            let raw: Vec<(String, Vec<u8>)> = {
                let mut state = self.state.write().await;
                state.ensure_open()?;
                let now = Instant::now();
                keys.iter()
                    .filter_map(|key| state.lookup(key, now).map(|data| (key.clone(), data)))
                    .collect()
            };

            let mut items = HashMap::with_capacity(raw.len());
            let mut expired = Vec::new();
            for (key, data) in raw {
                match CacheItem::from_bytes(&data) {
                    Ok(item) if item.is_expired() => expired.push(key),
                    Ok(item) => {
                        items.insert(key, item);
                    }
                    Err(err) => warn!(key = %key, error = %err, "failed to decode cache item"),
                }
            }

            if !expired.is_empty() {
                self.lazy_delete(expired);
            }

            debug!(requested = keys.len(), found = items.len(), "multiple cache items retrieved");
            Ok(items)
        })
        .await
    }

    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            for key in keys {
                state.entries.remove(key);
            }
            debug!(count = keys.len(), "multiple cache items deleted");
            Ok(())
        })
        .await
    }

    async fn clear(&self, ctx: &OpContext) -> Result<()> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.entries.clear();
            info!("cache cleared");
            Ok(())
        })
        .await
    }

    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<()> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.purge_if_expired(key, Instant::now());

            let data = match state.entries.get(key) {
                Some(stored) => stored.data.clone(),
                None => return Err(CacheError::NotFound(key.to_string())),
            };

            let now = Utc::now();
            let mut item = CacheItem::from_bytes(&data)?;
            item.expire_in(ttl, now);
            let remaining = item.remaining_ttl_at(now);
            state.put(key.to_string(), item.to_bytes()?, remaining);

            debug!(key, ?ttl, "expiration set");
            Ok(())
        })
        .await
    }

    async fn ttl(&self, ctx: &OpContext, key: &str) -> Result<Option<Duration>> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            let now = Instant::now();
            state.purge_if_expired(key, now);

            match state.entries.get(key) {
                Some(stored) => Ok(stored
                    .expires_at
                    .map(|expires| expires.saturating_duration_since(now))),
                None => Err(CacheError::NotFound(key.to_string())),
            }
        })
        .await
    }

    async fn keys(&self, ctx: &OpContext, pattern: &str) -> Result<Vec<String>> {
        ctx.run(async {
            let matcher = glob_to_regex(pattern).map_err(|err| {
                CacheError::InvalidRequest(format!("invalid key pattern: {}", err))
            })?;
            let state = self.state.read().await;
            state.ensure_open()?;
            let now = Instant::now();
            Ok(state
                .entries
                .iter()
                .filter(|(key, stored)| !stored.is_expired(now) && matcher.is_match(key))
                .map(|(key, _)| key.clone())
                .collect())
        })
        .await
    }

    async fn flush_expired(&self, ctx: &OpContext) -> Result<usize> {
        ctx.run(async {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            Ok(state.cleanup_expired(Instant::now()))
        })
        .await
    }

    async fn size(&self, ctx: &OpContext) -> Result<u64> {
        ctx.run(async {
            let state = self.state.read().await;
            state.ensure_open()?;
            Ok(state.entries.len() as u64)
        })
        .await
    }

    async fn info(&self, ctx: &OpContext) -> Result<HashMap<String, String>> {
        ctx.run(async {
            let state = self.state.read().await;
            state.ensure_open()?;
            Ok(parse_info(&state.stats.render(state.entries.len())))
        })
        .await
    }

    async fn ping(&self, ctx: &OpContext) -> Result<()> {
        ctx.run(async {
            let state = self.state.read().await;
            state.ensure_open()
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.closed = true;
        info!("memory cache closed");
        Ok(())
    }
}
