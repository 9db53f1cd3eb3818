//! HTTP Error Mapping
//!
//! Converts storage/metadata errors into status codes and JSON bodies:
//!
//! | Error | Status |
//! |---|---|
//! | validation failure | 400 with `(field, message)` list |
//! | unknown namespace/profile | 404 |
//! | name collision | 400 |
//! | namespace stopped/unusable | 503 |
//! | anything else | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use recengine_metadata::{MetadataError, ValidationError};
use recengine_storage::Error as StorageError;

use crate::models::{ErrorResponse, FieldErrorMsg, ValidationErrorResponse};

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NamespaceNotFound(name) => {
                ApiError::NotFound(format!("namespace {name} not found"))
            }
            StorageError::NameTaken(name) => {
                ApiError::Conflict(format!("namespace name {name} is already taken"))
            }
            StorageError::Stopped => ApiError::Unavailable("the namespace stopped".into()),
            StorageError::Unusable(name) => {
                ApiError::Unavailable(format!("namespace {name} is unusable"))
            }
            StorageError::Metadata(MetadataError::Validation(e)) => ApiError::Validation(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => {
                let body = ValidationErrorResponse {
                    error: "validation failed".into(),
                    fields: e
                        .fields
                        .into_iter()
                        .map(|f| FieldErrorMsg {
                            field: f.field,
                            message: f.message,
                        })
                        .collect(),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { error: message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
            }
            ApiError::Unavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error: message }),
                )
                    .into_response()
            }
        }
    }
}
