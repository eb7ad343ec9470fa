//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use super::handlers::{
    batch_delete_handler, batch_get_handler, batch_set_handler, clear_handler,
    delete_item_handler, exists_item_handler, expire_item_handler, get_item_handler,
    health_handler, keys_handler, ping_handler, set_item_handler, stats_handler,
    ttl_item_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// Static segments (`keys`, `stats`, `batch`) take precedence over the
/// `:key` capture, so those names cannot be addressed as single items.
///
/// # Middleware
/// Outermost first: request id assignment, panic recovery, request
/// tracing, CORS, request id propagation onto the response, the overall
/// request timeout (408) and the body read timeout.
pub fn create_router(state: AppState) -> Router {
    let read_timeout = state.read_timeout;
    let write_timeout = state.write_timeout;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/api/v1/cache", delete(clear_handler))
        .route("/api/v1/cache/keys", get(keys_handler))
        .route("/api/v1/cache/stats", get(stats_handler))
        .route(
            "/api/v1/cache/batch",
            post(batch_set_handler).delete(batch_delete_handler),
        )
        .route("/api/v1/cache/batch/get", post(batch_get_handler))
        .route(
            "/api/v1/cache/:key",
            put(set_item_handler)
                .get(get_item_handler)
                .delete(delete_item_handler)
                .head(exists_item_handler),
        )
        .route("/api/v1/cache/:key/expire", put(expire_item_handler))
        .route("/api/v1/cache/:key/ttl", get(ttl_item_handler))
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .layer(TimeoutLayer::new(write_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
