//! Cache Module
//!
//! The item model, the [`Cache`] operation surface and its two
//! implementations: Redis for production and an in-memory map for tests
//! and local development.

mod context;
mod info;
mod item;
mod memory;
mod pattern;
mod redis;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use context::OpContext;
pub use info::parse_info;
pub use item::CacheItem;
pub use memory::MemoryCache;
pub use pattern::{glob_match, glob_to_regex};
pub use redis::RedisCache;
pub use stats::KeyspaceStats;
pub use store::{ttl_millis, Cache};
