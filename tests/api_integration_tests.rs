//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against the
//! in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use distcache::{api::create_router, AppState, Cache, MemoryCache};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::new(Arc::new(MemoryCache::new())))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn put_item(app: &Router, key: &str, body: Value) -> StatusCode {
    app.clone()
        .oneshot(json_request("PUT", &format!("/api/v1/cache/{}", key), body))
        .await
        .unwrap()
        .status()
}

// == Single Item Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/v1/cache/user:123",
            json!({"value": {"name": "John", "age": 30}, "ttl": "30m"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "item stored successfully");
}

#[tokio::test]
async fn test_set_then_get() {
    let app = create_test_app();

    let status = put_item(&app, "user:1", json!({"value": {"name": "Ada"}})).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/user:1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "user:1");
    assert_eq!(json["value"], json!({"name": "Ada"}));
    assert!(json["created_at"].is_string());
    assert!(json["expires_at"].is_string());
    // Default TTL is one hour
    assert!(json["remaining_ttl"].as_str().unwrap().starts_with("59m"));
}

#[tokio::test]
async fn test_set_invalid_ttl() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/v1/cache/k",
            json!({"value": 1, "ttl": "one hour"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "invalid TTL format");
}

#[tokio::test]
async fn test_set_malformed_body() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/cache/k")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "invalid request body");
}

#[tokio::test]
async fn test_get_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_get_after_ttl_expiry() {
    let app = create_test_app();

    put_item(&app, "short", json!({"value": "v", "ttl": "100ms"})).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/short"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let app = create_test_app();

    put_item(&app, "k", json!({"value": 1})).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/v1/cache/k"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/k"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_head_exists() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(empty_request("HEAD", "/api/v1/cache/k"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    put_item(&app, "k", json!({"value": 1})).await;

    let response = app
        .oneshot(empty_request("HEAD", "/api/v1/cache/k"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

// == Expiration Tests ==

#[tokio::test]
async fn test_expire_and_ttl() {
    let app = create_test_app();

    put_item(&app, "k", json!({"value": 1, "ttl": "1h"})).await;

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/v1/cache/k/expire", json!({"ttl": "30s"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/k/ttl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "k");
    let ttl = json["ttl"].as_str().unwrap();
    assert!(!ttl.contains('m') && ttl.ends_with('s'), "ttl was {}", ttl);
}

#[tokio::test]
async fn test_expire_missing_key() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/api/v1/cache/missing/expire", json!({"ttl": "30s"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ttl_missing_key() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/missing/ttl"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Batch Tests ==

#[tokio::test]
async fn test_batch_set_get_delete() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/cache/batch",
            json!({"items": {
                "a": {"value": 1},
                "b": {"value": "two", "ttl": "10m"},
            }}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/cache/batch/get",
            json!({"keys": ["a", "b", "missing"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["items"]["a"]["value"], 1);
    assert_eq!(json["items"]["b"]["value"], "two");
    assert!(json["items"].get("missing").is_none());

    let response = app
        .clone()
        .oneshot(json_request("DELETE", "/api/v1/cache/batch", json!({"keys": ["a", "b"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/stats"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 0);
}

#[tokio::test]
async fn test_batch_set_bad_ttl_names_key() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/cache/batch",
            json!({"items": {"broken": {"value": 1, "ttl": "nope"}}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "invalid TTL format for key: broken");
}

#[tokio::test]
async fn test_batch_set_on_closed_backend() {
    let cache = Arc::new(MemoryCache::new());
    let app = create_router(AppState::new(cache.clone()));
    cache.close().await.unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/cache/batch",
            json!({"items": {"a": {"value": 1}}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "internal cache error");
}

// == Namespace Tests ==

#[tokio::test]
async fn test_clear_requires_confirmation() {
    let app = create_test_app();

    put_item(&app, "k", json!({"value": 1})).await;

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/api/v1/cache"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/api/v1/cache?confirm=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/stats"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 0);
}

#[tokio::test]
async fn test_keys_with_pattern() {
    let app = create_test_app();

    for key in ["user:1", "user:2", "session:1"] {
        put_item(&app, key, json!({"value": key})).await;
    }

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/v1/cache/keys?pattern=user:*"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["pattern"], "user:*");

    let mut keys: Vec<String> = serde_json::from_value(json["keys"].clone()).unwrap();
    keys.sort();
    assert_eq!(keys, vec!["user:1", "user:2"]);

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/keys"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["pattern"], "*");
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    put_item(&app, "k", json!({"value": 1})).await;
    app.clone()
        .oneshot(empty_request("GET", "/api/v1/cache/k"))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty_request("GET", "/api/v1/cache/missing"))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/api/v1/cache/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 1);
    assert_eq!(json["info"]["backend"], "memory");
    assert_eq!(json["info"]["keyspace_hits"], "1");
    assert_eq!(json["info"]["keyspace_misses"], "1");
}

// == Health Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_ping_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/ping")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "pong");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
