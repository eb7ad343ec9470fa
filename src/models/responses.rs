//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheItem;
use crate::duration::format_duration;

/// Body for `GET /api/v1/cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Time left before expiry, e.g. `"59m59.9s"`
    pub remaining_ttl: String,
}

impl From<CacheItem> for ItemResponse {
    fn from(item: CacheItem) -> Self {
        let remaining_ttl = format_duration(item.remaining_ttl());
        Self {
            key: item.key,
            value: item.value,
            created_at: item.created_at,
            expires_at: item.expires_at,
            remaining_ttl,
        }
    }
}

/// One entry of a batch read, keyed by its cache key in the parent map
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResponse {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_ttl: String,
}

impl From<CacheItem> for BatchItemResponse {
    fn from(item: CacheItem) -> Self {
        let remaining_ttl = format_duration(item.remaining_ttl());
        Self {
            value: item.value,
            created_at: item.created_at,
            expires_at: item.expires_at,
            remaining_ttl,
        }
    }
}

/// Body for `POST /api/v1/cache/batch/get`
#[derive(Debug, Clone, Serialize)]
pub struct BatchGetResponse {
    pub items: HashMap<String, BatchItemResponse>,
    pub count: usize,
}

impl BatchGetResponse {
    pub fn new(items: HashMap<String, CacheItem>) -> Self {
        let items: HashMap<String, BatchItemResponse> = items
            .into_iter()
            .map(|(key, item)| (key, item.into()))
            .collect();
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Acknowledgement for batch writes and deletes
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub message: String,
    pub count: usize,
}

impl CountResponse {
    pub fn new(message: impl Into<String>, count: usize) -> Self {
        Self {
            message: message.into(),
            count,
        }
    }
}

/// Body for `GET /api/v1/cache/:key/ttl`
#[derive(Debug, Clone, Serialize)]
pub struct TtlResponse {
    pub key: String,
    /// `null` when the key has no expiration
    pub ttl: Option<String>,
}

/// Body for `GET /api/v1/cache/keys`
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
    pub count: usize,
    pub pattern: String,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>, pattern: impl Into<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
            pattern: pattern.into(),
        }
    }
}

/// Body for `GET /api/v1/cache/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of keys in the namespace
    pub size: u64,
    /// Backend diagnostics; empty if they could not be fetched
    pub info: HashMap<String, String>,
}

/// Body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` or `"unhealthy"`
    pub status: String,
    /// Current timestamp in ISO 8601 format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Some(Utc::now().to_rfc3339()),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            timestamp: None,
            error: Some(error.into()),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_item_response_from_item() {
        let item = CacheItem::new("k", json!({"x": 1}), Duration::from_secs(60));
        let resp = ItemResponse::from(item.clone());

        assert_eq!(resp.key, "k");
        assert_eq!(resp.value, json!({"x": 1}));
        assert_eq!(resp.expires_at, item.expires_at);
        assert!(resp.remaining_ttl.ends_with('s'));
    }

    #[test]
    fn test_batch_get_response_counts() {
        let mut items = HashMap::new();
        items.insert("a".to_string(), CacheItem::new("a", json!(1), Duration::from_secs(5)));
        items.insert("b".to_string(), CacheItem::new("b", json!(2), Duration::from_secs(5)));

        let resp = BatchGetResponse::new(items);
        assert_eq!(resp.count, 2);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["items"]["a"]["value"], json!(1));
        assert!(json["items"]["a"].get("key").is_none());
    }

    #[test]
    fn test_keys_response() {
        let resp = KeysResponse::new(vec!["p:a".into(), "p:b".into()], "p:*");
        assert_eq!(resp.count, 2);
        assert_eq!(resp.pattern, "p:*");
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_value(HealthResponse::healthy()).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(HealthResponse::unhealthy("ping failed")).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["error"], "ping failed");
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&ErrorResponse::new("Something went wrong")).unwrap();
        assert!(json.contains("Something went wrong"));
    }
}
