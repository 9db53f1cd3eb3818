//! Profile data endpoints
//!
//! Every handler resolves the namespace actor through the registry and posts
//! one request into its inbox; the reply arrives on a per-request channel.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiError;
use crate::models::*;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}/profiles/{user}",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "The reconstructed profile", body = ProfileResponse),
        (status = 404, description = "Namespace or profile not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, u64)>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let actor = state.registry.actor(&name).await?;
    let profile = actor
        .get_profile(user)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("profile {user} not found")))?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/namespaces/{name}/profiles/{user}",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id")
    ),
    responses(
        (status = 204, description = "Profile deleted (absent profiles are fine)"),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn delete_profile(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    let actor = state.registry.actor(&name).await?;
    actor.delete_profile(user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/namespaces/{name}/profiles/{user}/likes/{item}",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id"),
        ("item" = u64, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Item liked"),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn like_item(
    State(state): State<AppState>,
    Path((name, user, item)): Path<(String, u64, u64)>,
) -> Result<StatusCode, ApiError> {
    let actor = state.registry.actor(&name).await?;
    actor.like(user, item).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/namespaces/{name}/profiles/{user}/dislikes/{item}",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id"),
        ("item" = u64, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Item disliked"),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn dislike_item(
    State(state): State<AppState>,
    Path((name, user, item)): Path<(String, u64, u64)>,
) -> Result<StatusCode, ApiError> {
    let actor = state.registry.actor(&name).await?;
    actor.dislike(user, item).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v1/namespaces/{name}/profiles/{user}/items/{item}",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id"),
        ("item" = u64, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Item removed from whichever side held it"),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path((name, user, item)): Path<(String, u64, u64)>,
) -> Result<StatusCode, ApiError> {
    let actor = state.registry.actor(&name).await?;
    actor.delete_item(user, item).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}/profiles/{user}/similar",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Most similar profiles, best first", body = Vec<SimilarProfileResponse>),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn similar_profiles(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, u64)>,
) -> Result<Json<Vec<SimilarProfileResponse>>, ApiError> {
    let actor = state.registry.actor(&name).await?;
    let similar = actor.similar_profiles(user).await?;
    Ok(Json(
        similar.into_iter().map(SimilarProfileResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}/profiles/{user}/recommendations",
    params(
        ("name" = String, Path, description = "Namespace name"),
        ("user" = u64, Path, description = "User id"),
        ("limit" = Option<usize>, Query, description = "Max items to return")
    ),
    responses(
        (status = 200, description = "Recommended items, best first", body = Vec<RecommendedItem>),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "profiles"
)]
pub async fn recommend_items(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, u64)>,
    Query(params): Query<RecommendQueryParams>,
) -> Result<Json<Vec<RecommendedItem>>, ApiError> {
    let actor = state.registry.actor(&name).await?;
    let items = actor.recommend(user, params.limit).await?;
    Ok(Json(items.into_iter().map(RecommendedItem::from).collect()))
}
