//! RecEngine Metadata
//!
//! Namespace descriptors and the catalog that persists them. While the
//! per-namespace data files hold the actual profiles, the catalog tracks
//! which namespaces exist and their tuning knobs (`maxSimilarProfiles`,
//! `dislikeFactor`), serialized as a JSON array at `<data_dir>/namespaces.json`.
//!
//! The storage layer consumes the catalog through the [`CatalogStore`] trait
//! (`Arc<dyn CatalogStore>`), so tests can swap in alternative backends.

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{CatalogStore, JsonCatalogStore};
pub use error::{FieldError, MetadataError, Result, ValidationError};
pub use types::{
    is_valid_name, NamespaceDescriptor, NamespaceKind, NamespaceUpdate,
    DEFAULT_MAX_SIMILAR_PROFILES,
};
