//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Every handler builds
//! an [`OpContext`] bounded by the configured request timeout before calling
//! into the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheItem, OpContext};
use crate::duration::format_duration;
use crate::error::{CacheError, Result};
use crate::models::{
    parse_ttl, BatchGetResponse, BatchSetRequest, ClearQuery, CountResponse, ExpireRequest,
    HealthResponse, ItemResponse, KeysQuery, KeysRequest, KeysResponse, MessageResponse,
    SetItemRequest, StatsResponse, TtlResponse,
};

/// Deadline for a single request's cache calls when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit for receiving a body and for producing a response.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend-agnostic cache façade
    pub cache: Arc<dyn Cache>,
    /// Deadline applied to each request's cache calls
    pub request_timeout: Duration,
    /// Limit for receiving a request body
    pub read_timeout: Duration,
    /// Limit for the whole request, answered with 408 when exceeded
    pub write_timeout: Duration,
}

impl AppState {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            read_timeout: DEFAULT_HTTP_TIMEOUT,
            write_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_server_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    /// Context for one request's cache calls.
    fn ctx(&self) -> OpContext {
        OpContext::with_timeout(self.request_timeout)
    }
}

fn require_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("key is required".to_string()));
    }
    Ok(())
}

/// Unwraps a JSON body, reporting malformed input as a 400.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!(error = %rejection, "invalid request body");
            Err(CacheError::InvalidRequest("invalid request body".to_string()))
        }
    }
}

/// Handler for PUT /api/v1/cache/:key
pub async fn set_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: std::result::Result<Json<SetItemRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    require_key(&key)?;
    let req = body(payload)?;
    let ttl = parse_ttl(req.ttl.as_deref())?;

    state.cache.set(&state.ctx(), &key, req.value, ttl).await?;

    debug!(key, ?ttl, "cache item set via API");
    Ok(Json(MessageResponse::new("item stored successfully")))
}

/// Handler for GET /api/v1/cache/:key
pub async fn get_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ItemResponse>> {
    require_key(&key)?;

    match state.cache.get(&state.ctx(), &key).await? {
        Some(item) => Ok(Json(item.into())),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /api/v1/cache/:key
pub async fn delete_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    require_key(&key)?;

    state.cache.delete(&state.ctx(), &key).await?;

    debug!(key, "cache item deleted via API");
    Ok(Json(MessageResponse::new("item deleted successfully")))
}

/// Handler for HEAD /api/v1/cache/:key
///
/// Answers with a bare status code: 200 if the backend holds the key, 404
/// otherwise.
pub async fn exists_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Response {
    if key.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match state.cache.exists(&state.ctx(), &key).await {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            // HEAD responses carry no body, only the mapped status
            let status = err.into_response().status();
            status.into_response()
        }
    }
}

/// Handler for PUT /api/v1/cache/:key/expire
pub async fn expire_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: std::result::Result<Json<ExpireRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    require_key(&key)?;
    let req = body(payload)?;
    let ttl = crate::duration::parse_duration(&req.ttl)
        .map_err(|_| CacheError::InvalidRequest("invalid TTL format".to_string()))?;

    state.cache.expire(&state.ctx(), &key, ttl).await?;

    debug!(key, ?ttl, "expiration set via API");
    Ok(Json(MessageResponse::new("expiration set successfully")))
}

/// Handler for GET /api/v1/cache/:key/ttl
pub async fn ttl_item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TtlResponse>> {
    require_key(&key)?;

    let ttl = state.cache.ttl(&state.ctx(), &key).await?;

    Ok(Json(TtlResponse {
        key,
        ttl: ttl.map(format_duration),
    }))
}

/// Handler for POST /api/v1/cache/batch
///
/// The whole batch is rejected if any entry carries an unparsable TTL.
pub async fn batch_set_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchSetRequest>, JsonRejection>,
) -> Result<Json<CountResponse>> {
    let req = body(payload)?;

    let mut items = HashMap::with_capacity(req.items.len());
    for (key, entry) in req.items {
        let ttl = parse_ttl(entry.ttl.as_deref()).map_err(|_| {
            CacheError::InvalidRequest(format!("invalid TTL format for key: {}", key))
        })?;
        let item = CacheItem::new(key.clone(), entry.value, ttl);
        items.insert(key, item);
    }
    let count = items.len();

    state.cache.set_multiple(&state.ctx(), items).await?;

    debug!(count, "multiple cache items set via API");
    Ok(Json(CountResponse::new("items stored successfully", count)))
}

/// Handler for POST /api/v1/cache/batch/get
pub async fn batch_get_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<KeysRequest>, JsonRejection>,
) -> Result<Json<BatchGetResponse>> {
    let req = body(payload)?;

    let items = state.cache.get_multiple(&state.ctx(), &req.keys).await?;

    Ok(Json(BatchGetResponse::new(items)))
}

/// Handler for DELETE /api/v1/cache/batch
pub async fn batch_delete_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<KeysRequest>, JsonRejection>,
) -> Result<Json<CountResponse>> {
    let req = body(payload)?;
    let count = req.keys.len();

    state.cache.delete_multiple(&state.ctx(), &req.keys).await?;

    debug!(count, "multiple cache items deleted via API");
    Ok(Json(CountResponse::new("items deleted successfully", count)))
}

/// Handler for DELETE /api/v1/cache
///
/// Wipes the whole namespace, so the caller must opt in with
/// `?confirm=true`.
pub async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<MessageResponse>> {
    if !query.confirm {
        return Err(CacheError::InvalidRequest(
            "clearing the cache requires confirm=true".to_string(),
        ));
    }

    state.cache.clear(&state.ctx()).await?;

    info!("cache cleared via API");
    Ok(Json(MessageResponse::new("cache cleared successfully")))
}

/// Handler for GET /api/v1/cache/keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<KeysResponse>> {
    let pattern = match query.pattern {
        Some(pattern) if !pattern.is_empty() => pattern,
        _ => "*".to_string(),
    };

    let keys = state.cache.keys(&state.ctx(), &pattern).await?;

    Ok(Json(KeysResponse::new(keys, pattern)))
}

/// Handler for GET /api/v1/cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let ctx = state.ctx();
    let size = state.cache.size(&ctx).await?;

    let info = match state.cache.info(&ctx).await {
        Ok(info) => info,
        Err(err) => {
            warn!(error = %err, "failed to get cache info");
            HashMap::new()
        }
    };

    Ok(Json(StatsResponse { size, info }))
}

/// Handler for GET /health
///
/// Healthy only if the backing store answers a ping.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.cache.ping(&state.ctx()).await {
        Ok(()) => Json(HealthResponse::healthy()).into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::unhealthy(err.to_string())),
            )
                .into_response()
        }
    }
}

/// Handler for GET /ping
pub async fn ping_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("pong"))
}
