//! RecEngine REST API
//!
//! HTTP/JSON surface over the namespace registry: namespace management plus
//! the per-profile data operations (like/dislike/delete, similar profiles,
//! recommendations). Handlers stay thin: they validate, resolve the
//! namespace actor and await its reply.

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use recengine_storage::NamespaceRegistry;

pub mod error;
pub mod handlers;
pub mod models;
pub mod shutdown;

pub use error::ApiError;
pub use shutdown::{shutdown_signal, DRAIN_TIMEOUT};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NamespaceRegistry>,
}

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/namespaces",
            get(handlers::namespaces::list_namespaces)
                .post(handlers::namespaces::create_namespace),
        )
        .route(
            "/namespaces/:name",
            get(handlers::namespaces::get_namespace)
                .put(handlers::namespaces::update_namespace)
                .delete(handlers::namespaces::delete_namespace),
        )
        .route(
            "/namespaces/:name/profiles/:user",
            get(handlers::profiles::get_profile).delete(handlers::profiles::delete_profile),
        )
        .route(
            "/namespaces/:name/profiles/:user/likes/:item",
            put(handlers::profiles::like_item),
        )
        .route(
            "/namespaces/:name/profiles/:user/dislikes/:item",
            put(handlers::profiles::dislike_item),
        )
        .route(
            "/namespaces/:name/profiles/:user/items/:item",
            axum::routing::delete(handlers::profiles::delete_item),
        )
        .route(
            "/namespaces/:name/profiles/:user/similar",
            get(handlers::profiles::similar_profiles),
        )
        .route(
            "/namespaces/:name/profiles/:user/recommendations",
            get(handlers::profiles::recommend_items),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(CorsLayer::permissive())
}

/// OpenAPI specification
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check,
        handlers::namespaces::list_namespaces,
        handlers::namespaces::create_namespace,
        handlers::namespaces::get_namespace,
        handlers::namespaces::update_namespace,
        handlers::namespaces::delete_namespace,
        handlers::profiles::get_profile,
        handlers::profiles::delete_profile,
        handlers::profiles::like_item,
        handlers::profiles::dislike_item,
        handlers::profiles::delete_item,
        handlers::profiles::similar_profiles,
        handlers::profiles::recommend_items,
    ),
    components(schemas(
        models::NamespaceSummary,
        models::CreateNamespaceRequest,
        models::UpdateNamespaceRequest,
        models::ProfileResponse,
        models::SimilarProfileResponse,
        models::RecommendedItem,
        models::HealthResponse,
        models::ErrorResponse,
        models::FieldErrorMsg,
        models::ValidationErrorResponse,
    )),
    tags(
        (name = "namespaces", description = "Namespace management"),
        (name = "profiles", description = "Profile data, similarity and recommendations"),
        (name = "health", description = "Health checks"),
    ),
    info(
        title = "RecEngine API",
        version = "0.1.0",
        description = "REST API for RecEngine, a multi-tenant recommendation engine"
    )
)]
struct ApiDoc;
