//! Cache Store Module
//!
//! The operation surface shared by every backing-store implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheItem, OpContext};
use crate::error::Result;

// == Cache Trait ==
/// Key/value façade with per-item expiration.
///
/// Implementations hold no item state of their own beyond a handle to the
/// backing store and are safe to share across tasks behind an `Arc`.
///
/// Every call takes an [`OpContext`]; when it fires the call returns
/// `Cancelled` or `DeadlineExceeded` instead of waiting on the backend.
///
/// Reads double-check the decoded item's own `expires_at`: an item the
/// backend still holds but which is logically expired is reported as a miss
/// and removed by a detached lazy delete. `exists` does not do this check,
/// so it can briefly report `true` for a key `get` already treats as gone.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stores `value` under `key` for `ttl`, replacing any previous item.
    async fn set(&self, ctx: &OpContext, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Returns the live item at `key`, or `None` on a miss.
    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<CacheItem>>;

    /// Removes `key`. Succeeds whether or not the key existed.
    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()>;

    /// Backend existence check, without decoding the item.
    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool>;

    /// Writes every item in one batch, each with its own `ttl`.
    ///
    /// Items that fail to encode are logged and skipped; a transport failure
    /// fails the whole call.
    async fn set_multiple(&self, ctx: &OpContext, items: HashMap<String, CacheItem>) -> Result<()>;

    /// Returns the live items among `keys`. Misses, undecodable entries and
    /// expired entries are left out of the result.
    async fn get_multiple(
        &self,
        ctx: &OpContext,
        keys: &[String],
    ) -> Result<HashMap<String, CacheItem>>;

    /// Removes all `keys` in one call. Empty input is a no-op.
    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> Result<()>;

    /// Removes every key in the namespace.
    async fn clear(&self, ctx: &OpContext) -> Result<()>;

    /// Resets the expiration of an existing key to `ttl` from now.
    ///
    /// Fails with `NotFound` if the key does not exist.
    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<()>;

    /// Remaining lifetime reported by the backend.
    ///
    /// `Ok(None)` means the key exists without an expiration; an absent key
    /// fails with `NotFound`.
    async fn ttl(&self, ctx: &OpContext, key: &str) -> Result<Option<Duration>>;

    /// All keys matching the glob `pattern`, in one unpaginated result.
    async fn keys(&self, ctx: &OpContext, pattern: &str) -> Result<Vec<String>>;

    /// Proactively drops expired entries and returns how many were removed.
    async fn flush_expired(&self, ctx: &OpContext) -> Result<usize>;

    /// Number of keys in the namespace, regardless of expiration state.
    async fn size(&self, ctx: &OpContext) -> Result<u64>;

    /// Free-form diagnostics from the backend.
    async fn info(&self, ctx: &OpContext) -> Result<HashMap<String, String>>;

    /// Connectivity check.
    async fn ping(&self, ctx: &OpContext) -> Result<()>;

    /// Releases the backend handle. Call once, from the owner.
    async fn close(&self) -> Result<()>;
}

/// Converts a TTL to whole milliseconds for the backend, rounding a
/// non-zero sub-millisecond TTL up to 1ms.
pub fn ttl_millis(ttl: Duration) -> u64 {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !ttl.is_zero() {
        1
    } else {
        millis
    }
}
