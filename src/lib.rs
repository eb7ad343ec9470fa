//! distcache - an HTTP key/value cache with per-item TTL
//!
//! Fronts a Redis backing store (or an in-process map for development)
//! with a small JSON API. Items carry their own creation and expiration
//! timestamps so reads can double-check expiry independently of the backend.

pub mod api;
pub mod cache;
pub mod config;
pub mod duration;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{Cache, CacheItem, MemoryCache, OpContext, RedisCache};
pub use config::{Config, ConfigError};
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
