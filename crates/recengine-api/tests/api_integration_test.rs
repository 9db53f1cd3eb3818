//! Integration tests for the RecEngine REST API
//!
//! Tests the HTTP endpoints by creating a real router over a tempdir-backed
//! registry, then sending requests via tower::ServiceExt.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use recengine_api::{create_router, AppState};
use recengine_metadata::JsonCatalogStore;
use recengine_storage::{NamespaceRegistry, StorageConfig};

/// Create a test app backed by a temporary data directory.
async fn test_app(dir: &tempfile::TempDir) -> axum::Router {
    let catalog = Arc::new(JsonCatalogStore::new(dir.path()));
    let config = StorageConfig {
        batch_window: Duration::from_millis(1),
        ..StorageConfig::default()
    };
    let registry = NamespaceRegistry::load(catalog, dir.path().to_path_buf(), config)
        .await
        .unwrap();
    create_router(AppState {
        registry: Arc::new(registry),
    })
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .oneshot(empty_request(Method::GET, "/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_and_get_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/namespaces",
            serde_json::json!({
                "name": "movies",
                "type": "like",
                "dislikeFactor": 0.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["name"], "movies");
    assert_eq!(json["type"], "like");
    assert_eq!(json["maxSimilarProfiles"], 1000); // 0/absent → default

    let resp = app
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/movies"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/unknown"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_namespace_validation_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/namespaces",
            serde_json::json!({
                "name": "9bad name",
                "type": "rating",
                "dislikeFactor": 2.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["error"], "validation failed");
    let fields: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"type"));
    assert!(fields.contains(&"dislikeFactor"));
}

#[tokio::test]
async fn test_duplicate_namespace_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let body = serde_json::json!({"name": "movies", "type": "like", "dislikeFactor": 1.0});
    let resp = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/namespaces", body.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .oneshot(json_request(Method::POST, "/api/v1/namespaces", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    for name in ["movies", "books"] {
        let resp = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/namespaces",
                serde_json::json!({"name": name, "type": "like", "dislikeFactor": 1.0}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    // Renaming movies onto books collides.
    let resp = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/namespaces/movies",
            serde_json::json!({"name": "books", "dislikeFactor": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/namespaces/movies",
            serde_json::json!({"name": "films", "maxSimilarProfiles": 42, "dislikeFactor": 0.25}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["name"], "films");
    assert_eq!(json["maxSimilarProfiles"], 42);

    let resp = app
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/namespaces/missing",
            serde_json::json!({"name": "missing", "dislikeFactor": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/namespaces",
            serde_json::json!({"name": "movies", "type": "like", "dislikeFactor": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/namespaces/movies"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/movies"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(empty_request(Method::DELETE, "/api/v1/namespaces/movies"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_data_operations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/namespaces",
            serde_json::json!({"name": "movies", "type": "like", "dislikeFactor": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    for uri in [
        "/api/v1/namespaces/movies/profiles/7/likes/13",
        "/api/v1/namespaces/movies/profiles/7/likes/5",
        "/api/v1/namespaces/movies/profiles/7/dislikes/99",
    ] {
        let resp = app
            .clone()
            .oneshot(empty_request(Method::PUT, uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    let resp = app
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/movies/profiles/7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["user"], 7);
    assert_eq!(json["likes"], serde_json::json!([5, 13]));
    assert_eq!(json["dislikes"], serde_json::json!([99]));

    // Unknown profile and unknown namespace both 404.
    let resp = app
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/movies/profiles/1234"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/nope/profiles/7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Remove an item, then the whole profile.
    let resp = app
        .clone()
        .oneshot(empty_request(
            Method::DELETE,
            "/api/v1/namespaces/movies/profiles/7/items/13",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/namespaces/movies/profiles/7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(empty_request(Method::GET, "/api/v1/namespaces/movies/profiles/7"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_similar_and_recommendations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/namespaces",
            serde_json::json!({"name": "movies", "type": "like", "dislikeFactor": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // User 1 likes 10; user 2 likes 10 and 30.
    for uri in [
        "/api/v1/namespaces/movies/profiles/1/likes/10",
        "/api/v1/namespaces/movies/profiles/2/likes/10",
        "/api/v1/namespaces/movies/profiles/2/likes/30",
    ] {
        let resp = app
            .clone()
            .oneshot(empty_request(Method::PUT, uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    let resp = app
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/namespaces/movies/profiles/1/similar",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    let similar = json.as_array().unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["user"], 2);

    let resp = app
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/namespaces/movies/profiles/1/recommendations?limit=5",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    let recs = json.as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["item"], 30);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir).await;

    let resp = app
        .oneshot(empty_request(Method::GET, "/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["info"]["title"], "RecEngine API");
    assert!(json["paths"]["/api/v1/namespaces"].is_object());
}
