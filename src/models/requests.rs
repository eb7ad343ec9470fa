//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::duration::parse_duration;
use crate::error::CacheError;

/// TTL applied when a write does not specify one.
pub const DEFAULT_ITEM_TTL: Duration = Duration::from_secs(3600);

/// Parses an optional TTL string, falling back to [`DEFAULT_ITEM_TTL`].
pub fn parse_ttl(ttl: Option<&str>) -> Result<Duration, CacheError> {
    match ttl {
        None | Some("") => Ok(DEFAULT_ITEM_TTL),
        Some(raw) => parse_duration(raw)
            .map_err(|_| CacheError::InvalidRequest("invalid TTL format".to_string())),
    }
}

/// Body for `PUT /api/v1/cache/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct SetItemRequest {
    /// Any JSON value; absent means `null`
    #[serde(default)]
    pub value: Value,
    /// Duration string such as `"30m"`; defaults to one hour
    #[serde(default)]
    pub ttl: Option<String>,
}

/// One entry of a batch write
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<String>,
}

/// Body for `POST /api/v1/cache/batch`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSetRequest {
    pub items: HashMap<String, BatchItem>,
}

/// Body for `POST /api/v1/cache/batch/get` and `DELETE /api/v1/cache/batch`
#[derive(Debug, Clone, Deserialize)]
pub struct KeysRequest {
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Body for `PUT /api/v1/cache/:key/expire`
#[derive(Debug, Clone, Deserialize)]
pub struct ExpireRequest {
    pub ttl: String,
}

/// Query for `GET /api/v1/cache/keys`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    pub pattern: Option<String>,
}

/// Query for `DELETE /api/v1/cache`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_item_request_deserialize() {
        let req: SetItemRequest = serde_json::from_str(r#"{"value": {"a": [1, 2]}}"#).unwrap();
        assert_eq!(req.value, json!({"a": [1, 2]}));
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_item_request_missing_value_is_null() {
        let req: SetItemRequest = serde_json::from_str(r#"{"ttl": "5m"}"#).unwrap();
        assert_eq!(req.value, Value::Null);
        assert_eq!(req.ttl.as_deref(), Some("5m"));
    }

    #[test]
    fn test_batch_set_request_deserialize() {
        let json = r#"{"items": {"a": {"value": 1}, "b": {"value": "x", "ttl": "10s"}}}"#;
        let req: BatchSetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.items.len(), 2);
        assert_eq!(req.items["b"].ttl.as_deref(), Some("10s"));
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl(None).unwrap(), DEFAULT_ITEM_TTL);
        assert_eq!(parse_ttl(Some("")).unwrap(), DEFAULT_ITEM_TTL);
        assert_eq!(parse_ttl(Some("90s")).unwrap(), Duration::from_secs(90));
        assert!(matches!(
            parse_ttl(Some("forever")),
            Err(CacheError::InvalidRequest(_))
        ));
    }
}
