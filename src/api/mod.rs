//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `GET /health` - Backend connectivity check
//! - `GET /ping` - Liveness check
//! - `PUT|GET|DELETE|HEAD /api/v1/cache/:key` - Single item operations
//! - `PUT /api/v1/cache/:key/expire` - Reset an item's TTL
//! - `GET /api/v1/cache/:key/ttl` - Remaining TTL
//! - `POST /api/v1/cache/batch` - Batch write
//! - `POST /api/v1/cache/batch/get` - Batch read
//! - `DELETE /api/v1/cache/batch` - Batch delete
//! - `DELETE /api/v1/cache?confirm=true` - Clear the namespace
//! - `GET /api/v1/cache/keys?pattern=` - Key enumeration
//! - `GET /api/v1/cache/stats` - Size and backend diagnostics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
