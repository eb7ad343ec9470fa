//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    parse_ttl, BatchItem, BatchSetRequest, ClearQuery, ExpireRequest, KeysQuery, KeysRequest,
    SetItemRequest, DEFAULT_ITEM_TTL,
};
pub use responses::{
    BatchGetResponse, BatchItemResponse, CountResponse, ErrorResponse, HealthResponse,
    ItemResponse, KeysResponse, MessageResponse, StatsResponse, TtlResponse,
};
