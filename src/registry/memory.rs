//! In-memory registry.
//!
//! Backs the binary when no external store is configured and every test
//! that needs a live watch stream. Writes are broadcast to all open watches.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::{Resource, ResourceKey, ResourceKind, ResourceMetadata, StageInfo};
use crate::registry::types::{Registry, RegistryError, RegistryResult};

/// Buffered events per watch before new events are dropped.
const WATCH_BUFFER: usize = 1024;

type StoreKey = (ResourceKind, String, String);

fn store_key(kind: &ResourceKind, key: &ResourceKey) -> StoreKey {
    (kind.clone(), key.stage.key(), key.resource_name.clone())
}

/// A thread-safe registry kept entirely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    objects: DashMap<StoreKey, Resource>,
    watchers: Arc<DashMap<u64, mpsc::Sender<ResourceMetadata>>>,
    next_watch_id: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding `resources`, without emitting events.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let registry = Self::new();
        for resource in resources {
            registry
                .objects
                .insert(store_key(&resource.kind, &resource.key()), resource);
        }
        registry
    }

    /// Load a JSON array of resources from disk.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let resources: Vec<Resource> = serde_json::from_reader(BufReader::new(file))?;
        let registry = Self::from_resources(resources);
        tracing::info!(
            path = ?path,
            objects = registry.len(),
            "Loaded registry seed file"
        );
        Ok(registry)
    }

    /// Store an object and notify watchers.
    pub fn put(&self, resource: Resource) {
        let event = resource.metadata();
        self.objects
            .insert(store_key(&resource.kind, &resource.key()), resource);
        self.notify(event);
    }

    /// Remove an object and notify watchers.
    pub fn remove(&self, kind: ResourceKind, key: &ResourceKey) -> Option<Resource> {
        let removed = self
            .objects
            .remove(&store_key(&kind, key))
            .map(|(_, resource)| resource);
        if removed.is_some() {
            self.notify(ResourceMetadata::new(
                key.stage.clone(),
                kind,
                key.resource_name.clone(),
            ));
        }
        removed
    }

    /// Push an arbitrary event to every watcher without touching storage.
    pub fn emit(&self, event: ResourceMetadata) {
        self.notify(event);
    }

    /// Drop every open watch; receivers observe a closed channel.
    pub fn close_watches(&self) {
        self.watchers.clear();
    }

    pub fn watch_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn notify(&self, event: ResourceMetadata) {
        for watcher in self.watchers.iter() {
            if let Err(e) = watcher.value().try_send(event.clone()) {
                tracing::warn!(
                    watch_id = *watcher.key(),
                    kind = %event.kind,
                    name = %event.name,
                    error = %e,
                    "Dropping watch event"
                );
            }
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(&self, kind: ResourceKind, key: &ResourceKey) -> RegistryResult<Resource> {
        self.objects
            .get(&store_key(&kind, key))
            .map(|r| r.value().clone())
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                key: key.clone(),
            })
    }

    async fn list(&self, kind: ResourceKind, stage: &StageInfo) -> RegistryResult<Vec<Resource>> {
        let mut resources: Vec<Resource> = self
            .objects
            .iter()
            .filter(|r| r.value().kind == kind && r.value().stage.same_stage(stage))
            .map(|r| r.value().clone())
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn list_stages(&self) -> RegistryResult<Vec<StageInfo>> {
        // Keyed by stage so duplicates collapse and output order is stable
        let stages: BTreeMap<String, StageInfo> = self
            .objects
            .iter()
            .filter(|r| r.value().kind == ResourceKind::Stage)
            .map(|r| (r.value().stage.key(), r.value().stage.clone()))
            .collect();
        Ok(stages.into_values().collect())
    }

    async fn watch(&self, token: CancellationToken) -> RegistryResult<mpsc::Receiver<ResourceMetadata>> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        self.watchers.insert(id, tx);

        let watchers = self.watchers.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            watchers.remove(&id);
        });

        tracing::debug!(watch_id = id, "Registry watch opened");
        Ok(rx)
    }
}
