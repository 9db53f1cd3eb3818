//! Namespace Registry
//!
//! Holds the live list of namespaces, routes requests to the right actor and
//! persists catalog mutations. One lock guards the list; it is held only
//! while the catalog is being mutated. Actor state is private to each
//! worker and never shared.
//!
//! A namespace whose actor failed to start (recovery failed) stays listed
//! but unusable: data operations on it fail while every other namespace
//! keeps serving.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use recengine_metadata::{CatalogStore, NamespaceDescriptor, NamespaceUpdate};

use crate::actor::NamespaceActor;
use crate::config::StorageConfig;
use crate::error::{Error, Result};

struct NamespaceEntry {
    descriptor: NamespaceDescriptor,
    /// `None` when the actor failed to start.
    actor: Option<Arc<NamespaceActor>>,
}

/// The process-wide namespace table.
pub struct NamespaceRegistry {
    data_dir: PathBuf,
    config: StorageConfig,
    catalog: Arc<dyn CatalogStore>,
    namespaces: RwLock<Vec<NamespaceEntry>>,
}

impl NamespaceRegistry {
    /// Loads the catalog and starts an actor per namespace. A namespace that
    /// fails to start is kept in the list but marked unusable; loading only
    /// fails if the catalog itself is unreadable.
    pub async fn load(
        catalog: Arc<dyn CatalogStore>,
        data_dir: PathBuf,
        config: StorageConfig,
    ) -> Result<Self> {
        let descriptors = catalog.load().await?;
        let mut namespaces = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let actor = match NamespaceActor::spawn(&descriptor, &data_dir, config.clone()).await
            {
                Ok(actor) => Some(Arc::new(actor)),
                Err(e) => {
                    tracing::error!(
                        namespace = %descriptor.name,
                        error = %e,
                        "failed to start namespace, marking unusable"
                    );
                    None
                }
            };
            namespaces.push(NamespaceEntry { descriptor, actor });
        }

        Ok(NamespaceRegistry {
            data_dir,
            config,
            catalog,
            namespaces: RwLock::new(namespaces),
        })
    }

    pub async fn list(&self) -> Vec<NamespaceDescriptor> {
        self.namespaces
            .read()
            .await
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub async fn get(&self, name: &str) -> Option<NamespaceDescriptor> {
        self.namespaces
            .read()
            .await
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .map(|entry| entry.descriptor.clone())
    }

    /// The actor serving a namespace's data operations.
    pub async fn actor(&self, name: &str) -> Result<Arc<NamespaceActor>> {
        let namespaces = self.namespaces.read().await;
        let entry = namespaces
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))?;
        entry
            .actor
            .clone()
            .ok_or_else(|| Error::Unusable(name.to_string()))
    }

    /// Registers a namespace, starts its actor and persists the catalog.
    /// Rejects duplicate names.
    pub async fn create(&self, descriptor: NamespaceDescriptor) -> Result<NamespaceDescriptor> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces
            .iter()
            .any(|entry| entry.descriptor.name == descriptor.name)
        {
            return Err(Error::NameTaken(descriptor.name));
        }

        let actor =
            NamespaceActor::spawn(&descriptor, &self.data_dir, self.config.clone()).await?;
        namespaces.push(NamespaceEntry {
            descriptor: descriptor.clone(),
            actor: Some(Arc::new(actor)),
        });
        self.save(&namespaces).await?;
        tracing::info!(namespace = %descriptor.name, "namespace created");
        Ok(descriptor)
    }

    /// Applies property changes to a namespace. Rejects rename collisions;
    /// the actor performs the file renames.
    pub async fn update(&self, name: &str, update: NamespaceUpdate) -> Result<NamespaceDescriptor> {
        let mut namespaces = self.namespaces.write().await;
        let position = namespaces
            .iter()
            .position(|entry| entry.descriptor.name == name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))?;
        if update.name != name
            && namespaces
                .iter()
                .any(|entry| entry.descriptor.name == update.name)
        {
            return Err(Error::NameTaken(update.name));
        }

        let entry = &namespaces[position];
        let actor = entry
            .actor
            .clone()
            .ok_or_else(|| Error::Unusable(name.to_string()))?;
        actor.update(update.clone()).await?;

        let entry = &mut namespaces[position];
        entry.descriptor.name = update.name;
        entry.descriptor.max_similar_profiles = update.max_similar_profiles;
        entry.descriptor.dislike_factor = update.dislike_factor;
        let descriptor = entry.descriptor.clone();

        self.save(&namespaces).await?;
        Ok(descriptor)
    }

    /// Stops the namespace's actor, removes it from the list and persists
    /// the catalog. The data files stay on disk.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let position = namespaces
            .iter()
            .position(|entry| entry.descriptor.name == name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))?;

        let entry = namespaces.remove(position);
        if let Some(actor) = entry.actor {
            if let Err(e) = actor.stop().await {
                tracing::error!(namespace = %name, error = %e, "error stopping namespace");
            }
        }
        self.save(&namespaces).await?;
        tracing::info!(namespace = %name, "namespace deleted");
        Ok(())
    }

    /// Stops every actor. Called once during graceful shutdown.
    pub async fn shutdown(&self) {
        let mut namespaces = self.namespaces.write().await;
        for entry in namespaces.iter_mut() {
            if let Some(actor) = entry.actor.take() {
                if let Err(e) = actor.stop().await {
                    tracing::error!(
                        namespace = %entry.descriptor.name,
                        error = %e,
                        "error stopping namespace"
                    );
                }
            }
        }
        tracing::info!("all namespaces stopped");
    }

    async fn save(&self, namespaces: &[NamespaceEntry]) -> Result<()> {
        let descriptors: Vec<NamespaceDescriptor> = namespaces
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect();
        self.catalog.save(&descriptors).await?;
        Ok(())
    }
}
