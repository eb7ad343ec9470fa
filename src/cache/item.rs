//! Cache Item Module
//!
//! Defines the record stored for every key, with its creation and
//! expiration timestamps.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest TTL an item can carry: the largest nanosecond count the wire
/// format holds (about 292 years).
pub const MAX_TTL: Duration = Duration::from_nanos(i64::MAX as u64);

// == Cache Item ==
/// A single cache entry as written to the backing store.
///
/// Serialized as JSON with fields `key`, `value`, `ttl` (nanoseconds),
/// `created_at` and `expires_at` (RFC 3339 timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    /// The key this item is stored under
    pub key: String,
    /// Arbitrary JSON payload
    pub value: Value,
    /// Requested lifetime, reported back to callers
    #[serde(with = "ttl_nanos")]
    pub ttl: Duration,
    /// Creation timestamp, never changes after construction
    pub created_at: DateTime<Utc>,
    /// `created_at + ttl`
    pub expires_at: DateTime<Utc>,
}

impl CacheItem {
    // == Constructor ==
    /// Creates a new item stamped with the current time.
    ///
    /// A zero `ttl` yields an item that every read path treats as expired.
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration) -> Self {
        Self::new_at(key, value, ttl, Utc::now())
    }

    /// Creates an item with an explicit creation time.
    ///
    /// TTLs above [`MAX_TTL`] are clamped to it.
    pub fn new_at(
        key: impl Into<String>,
        value: Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = add_ttl(now, ttl.min(MAX_TTL));
        Self {
            key: key.into(),
            value,
            ttl: span(now, expires_at),
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the item has expired at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// An item is expired once `now` is strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    // == Remaining TTL ==
    /// Returns the time left before expiry, never negative.
    pub fn remaining_ttl(&self) -> Duration {
        self.remaining_ttl_at(Utc::now())
    }

    /// Returns `expires_at - now`, or zero once expired.
    pub fn remaining_ttl_at(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired_at(now) {
            return Duration::ZERO;
        }
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    // == Expire In ==
    /// Moves the expiration to `now + ttl`, keeping `created_at`.
    ///
    /// The stored `ttl` is recomputed so `expires_at == created_at + ttl`
    /// still holds.
    pub fn expire_in(&mut self, ttl: Duration, now: DateTime<Utc>) {
        let latest = add_ttl(self.created_at, MAX_TTL);
        self.expires_at = add_ttl(now, ttl.min(MAX_TTL)).min(latest);
        self.ttl = span(self.created_at, self.expires_at);
    }

    // == Encoding ==
    /// Encodes the item into the bytes written to the backing store.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes an item previously written with [`CacheItem::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Adds a TTL to a timestamp, saturating at the maximum representable time.
fn add_ttl(at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `to - from`, or zero if `to` is earlier.
fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

/// TTL encoded as an integer count of nanoseconds.
mod ttl_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        // Negative values written by other producers are read as zero
        let nanos = i64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos.max(0) as u64))
    }
}
