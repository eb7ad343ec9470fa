//! Keyspace Statistics Module
//!
//! Counters kept by the in-memory backend and reported through `info()`
//! in the same `key:value` layout Redis uses.

// == Keyspace Stats ==
/// Tracks lookup and expiry counters for the in-memory backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyspaceStats {
    /// Lookups that found a live key
    pub hits: u64,
    /// Lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Keys removed because their expiry passed
    pub expired: u64,
}

impl KeyspaceStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    // == Render ==
    /// Renders an INFO-style text block for the given key count.
    pub fn render(&self, keys: usize) -> String {
        format!(
            "# Server\r\nbackend:memory\r\n\r\n# Stats\r\nkeyspace_hits:{}\r\nkeyspace_misses:{}\r\nexpired_keys:{}\r\nhit_rate:{:.4}\r\n\r\n# Keyspace\r\nkeys:{}\r\n",
            self.hits,
            self.misses,
            self.expired,
            self.hit_rate(),
            keys
        )
    }
}
