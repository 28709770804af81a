//! Registry contract and error definitions.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::{Resource, ResourceKey, ResourceKind, ResourceMetadata, StageInfo};

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested object does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: ResourceKey },

    /// The backend could not serve the request.
    #[error("Registry backend error: {0}")]
    Backend(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Declarative resource store the operator reconciles from.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch one object. Missing objects yield [`RegistryError::NotFound`].
    async fn get(&self, kind: ResourceKind, key: &ResourceKey) -> RegistryResult<Resource>;

    /// List every object of `kind` belonging to `stage`.
    async fn list(&self, kind: ResourceKind, stage: &StageInfo) -> RegistryResult<Vec<Resource>>;

    /// List every known stage.
    async fn list_stages(&self) -> RegistryResult<Vec<StageInfo>>;

    /// Open a change stream. The channel closes when `token` is cancelled
    /// or the backend breaks the watch.
    async fn watch(&self, token: CancellationToken) -> RegistryResult<mpsc::Receiver<ResourceMetadata>>;
}
