//! Namespace Descriptor Types
//!
//! A namespace is a tenant bucket: one population of profiles with its own
//! tuning knobs and three data files. The descriptor is what the catalog
//! persists and what the API reports.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default neighbor limit when a namespace is created with 0.
pub const DEFAULT_MAX_SIMILAR_PROFILES: u32 = 1000;

/// The kind of profiles a namespace stores. `like` is the only defined kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    Like,
}

impl NamespaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceKind::Like => "like",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(NamespaceKind::Like),
            _ => None,
        }
    }
}

impl std::fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A namespace as persisted in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: NamespaceKind,

    /// Neighbor limit for similarity queries. Always ≥ 1 after validation.
    pub max_similar_profiles: u32,

    /// How much dislikes contribute to similarity, in `[0, 1]`.
    pub dislike_factor: f32,
}

impl NamespaceDescriptor {
    /// Builds a validated descriptor. `max_similar_profiles = 0` is
    /// normalized to [`DEFAULT_MAX_SIMILAR_PROFILES`]. Collects every
    /// violation rather than stopping at the first.
    pub fn new(
        name: impl Into<String>,
        kind: NamespaceKind,
        max_similar_profiles: u32,
        dislike_factor: f32,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let mut errors = ValidationError::new();
        if !is_valid_name(&name) {
            errors.add("name", "invalid namespace name");
        }
        if !(0.0..=1.0).contains(&dislike_factor) {
            errors.add("dislikeFactor", "must be between 0 and 1");
        }
        errors.into_result()?;

        let max_similar_profiles = if max_similar_profiles == 0 {
            DEFAULT_MAX_SIMILAR_PROFILES
        } else {
            max_similar_profiles
        };

        Ok(NamespaceDescriptor {
            name,
            kind,
            max_similar_profiles,
            dislike_factor,
        })
    }
}

/// Property changes for an existing namespace (the kind is immutable).
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceUpdate {
    pub name: String,
    pub max_similar_profiles: u32,
    pub dislike_factor: f32,
}

impl NamespaceUpdate {
    pub fn new(
        name: impl Into<String>,
        max_similar_profiles: u32,
        dislike_factor: f32,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let mut errors = ValidationError::new();
        if !is_valid_name(&name) {
            errors.add("name", "invalid namespace name");
        }
        if !(0.0..=1.0).contains(&dislike_factor) {
            errors.add("dislikeFactor", "must be between 0 and 1");
        }
        errors.into_result()?;

        let max_similar_profiles = if max_similar_profiles == 0 {
            DEFAULT_MAX_SIMILAR_PROFILES
        } else {
            max_similar_profiles
        };

        Ok(NamespaceUpdate {
            name,
            max_similar_profiles,
            dislike_factor,
        })
    }
}

/// A namespace name starts with an ASCII letter followed by letters, digits,
/// underscores or dashes (`[A-Za-z][A-Za-z0-9_-]*`). Names become file names
/// on disk, so nothing else is allowed.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
