//! Namespace Catalog Persistence
//!
//! The catalog is a flat JSON array of namespace descriptors kept at
//! `<data_dir>/namespaces.json`. It is read once at startup and rewritten on
//! every catalog mutation (create, update, delete); the per-namespace data
//! files are owned by the namespace actors, not by the catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::NamespaceDescriptor;

/// Persistence seam for the namespace catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Loads every known namespace. A catalog that doesn't exist yet is an
    /// empty catalog, not an error.
    async fn load(&self) -> Result<Vec<NamespaceDescriptor>>;

    /// Persists the full namespace list.
    async fn save(&self, namespaces: &[NamespaceDescriptor]) -> Result<()>;
}

/// File-backed catalog store (`namespaces.json`).
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        JsonCatalogStore {
            path: data_dir.as_ref().join("namespaces.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn load(&self) -> Result<Vec<NamespaceDescriptor>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no catalog yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let namespaces = serde_json::from_slice(&data)?;
        Ok(namespaces)
    }

    async fn save(&self, namespaces: &[NamespaceDescriptor]) -> Result<()> {
        let data = serde_json::to_vec_pretty(namespaces)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamespaceKind;

    #[tokio::test]
    async fn test_missing_catalog_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());

        let namespaces = vec![
            NamespaceDescriptor::new("movies", NamespaceKind::Like, 100, 0.5).unwrap(),
            NamespaceDescriptor::new("books", NamespaceKind::Like, 0, 1.0).unwrap(),
        ];
        store.save(&namespaces).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, namespaces);
    }

    #[tokio::test]
    async fn test_catalog_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        let namespaces =
            vec![NamespaceDescriptor::new("movies", NamespaceKind::Like, 100, 0.5).unwrap()];
        store.save(&namespaces).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["name"], "movies");
        assert_eq!(json[0]["type"], "like");
        assert_eq!(json[0]["maxSimilarProfiles"], 100);
    }

    #[tokio::test]
    async fn test_corrupt_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        std::fs::write(store.path(), b"not json").unwrap();
        assert!(store.load().await.is_err());
    }
}
