//! Namespace management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiError;
use crate::models::*;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/namespaces",
    responses(
        (status = 200, description = "List all namespaces", body = Vec<NamespaceSummary>)
    ),
    tag = "namespaces"
)]
pub async fn list_namespaces(State(state): State<AppState>) -> Json<Vec<NamespaceSummary>> {
    let namespaces = state
        .registry
        .list()
        .await
        .into_iter()
        .map(NamespaceSummary::from)
        .collect();
    Json(namespaces)
}

#[utoipa::path(
    post,
    path = "/api/v1/namespaces",
    request_body = CreateNamespaceRequest,
    responses(
        (status = 201, description = "Namespace created", body = NamespaceSummary),
        (status = 400, description = "Validation error or name taken", body = ValidationErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn create_namespace(
    State(state): State<AppState>,
    Json(request): Json<CreateNamespaceRequest>,
) -> Result<(StatusCode, Json<NamespaceSummary>), ApiError> {
    let descriptor = request.into_descriptor()?;
    let created = state.registry.create(descriptor).await?;
    Ok((StatusCode::CREATED, Json(NamespaceSummary::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name")),
    responses(
        (status = 200, description = "Namespace details", body = NamespaceSummary),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn get_namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NamespaceSummary>, ApiError> {
    let descriptor = state
        .registry
        .get(&name)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("namespace {name} not found")))?;
    Ok(Json(NamespaceSummary::from(descriptor)))
}

#[utoipa::path(
    put,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name")),
    request_body = UpdateNamespaceRequest,
    responses(
        (status = 200, description = "Updated namespace", body = NamespaceSummary),
        (status = 400, description = "Validation error or name taken", body = ValidationErrorResponse),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn update_namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpdateNamespaceRequest>,
) -> Result<Json<NamespaceSummary>, ApiError> {
    let update = request.into_update()?;
    let updated = state.registry.update(&name, update).await?;
    Ok(Json(NamespaceSummary::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/namespaces/{name}",
    params(("name" = String, Path, description = "Namespace name")),
    responses(
        (status = 204, description = "Namespace deleted"),
        (status = 404, description = "Namespace not found", body = ErrorResponse)
    ),
    tag = "namespaces"
)]
pub async fn delete_namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
