//! API models for REST endpoints
//!
//! DTOs are decoupled from the domain: request bodies convert into domain
//! values through pure functions that collect `(field, message)` pairs into
//! a [`ValidationError`], which the error layer formats as a 400 body.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use recengine_core::{Profile, RecItem, SimilarProfile};
use recengine_metadata::{
    NamespaceDescriptor, NamespaceKind, NamespaceUpdate, ValidationError,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub max_similar_profiles: u32,
    pub dislike_factor: f32,
}

impl From<NamespaceDescriptor> for NamespaceSummary {
    fn from(d: NamespaceDescriptor) -> Self {
        NamespaceSummary {
            name: d.name,
            kind: d.kind.to_string(),
            max_similar_profiles: d.max_similar_profiles,
            dislike_factor: d.dislike_factor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamespaceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub max_similar_profiles: Option<u32>,
    pub dislike_factor: f32,
}

impl CreateNamespaceRequest {
    /// Pure DTO → domain conversion; collects every field violation.
    pub fn into_descriptor(self) -> Result<NamespaceDescriptor, ValidationError> {
        let Some(kind) = NamespaceKind::parse(&self.kind) else {
            let mut errors = ValidationError::new();
            errors.add("type", format!("invalid namespace type '{}'", self.kind));
            // Still surface name/factor problems alongside the bad type.
            if let Err(more) = NamespaceDescriptor::new(
                self.name,
                NamespaceKind::Like,
                self.max_similar_profiles.unwrap_or(0),
                self.dislike_factor,
            ) {
                errors.fields.extend(more.fields);
            }
            return Err(errors);
        };
        NamespaceDescriptor::new(
            self.name,
            kind,
            self.max_similar_profiles.unwrap_or(0),
            self.dislike_factor,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNamespaceRequest {
    pub name: String,
    #[serde(default)]
    pub max_similar_profiles: Option<u32>,
    pub dislike_factor: f32,
}

impl UpdateNamespaceRequest {
    pub fn into_update(self) -> Result<NamespaceUpdate, ValidationError> {
        NamespaceUpdate::new(
            self.name,
            self.max_similar_profiles.unwrap_or(0),
            self.dislike_factor,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: u64,
    pub likes: Vec<u64>,
    pub dislikes: Vec<u64>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        ProfileResponse {
            user: p.user_id,
            likes: p.likes,
            dislikes: p.dislikes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SimilarProfileResponse {
    pub user: u64,
    pub similarity: f32,
}

impl From<SimilarProfile> for SimilarProfileResponse {
    fn from(s: SimilarProfile) -> Self {
        SimilarProfileResponse {
            user: s.user_id,
            similarity: s.similarity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecommendedItem {
    pub item: u64,
    pub score: f32,
}

impl From<RecItem> for RecommendedItem {
    fn from(r: RecItem) -> Self {
        RecommendedItem {
            item: r.item_id,
            score: r.score,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecommendQueryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldErrorMsg {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub fields: Vec<FieldErrorMsg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_conversion() {
        let req = CreateNamespaceRequest {
            name: "movies".into(),
            kind: "like".into(),
            max_similar_profiles: None,
            dislike_factor: 0.5,
        };
        let descriptor = req.into_descriptor().unwrap();
        assert_eq!(descriptor.name, "movies");
        assert_eq!(descriptor.max_similar_profiles, 1000);
    }

    #[test]
    fn test_create_request_collects_field_errors() {
        let req = CreateNamespaceRequest {
            name: "9bad".into(),
            kind: "rating".into(),
            max_similar_profiles: None,
            dislike_factor: 7.0,
        };
        let err = req.into_descriptor().unwrap_err();
        let fields: Vec<&str> = err.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["type", "name", "dislikeFactor"]);
    }

    #[test]
    fn test_summary_serde_shape() {
        let descriptor =
            NamespaceDescriptor::new("movies", NamespaceKind::Like, 100, 0.5).unwrap();
        let summary = NamespaceSummary::from(descriptor);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "movies");
        assert_eq!(json["type"], "like");
        assert_eq!(json["maxSimilarProfiles"], 100);
        assert_eq!(json["dislikeFactor"], 0.5);
    }
}
