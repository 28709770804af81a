//! Downstream configuration and the synchronizer contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Converted proxy configuration for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfiguration {
    pub gateway_name: String,
    pub stage_name: String,
    #[serde(default)]
    pub routes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub services: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub plugin_metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub ssls: BTreeMap<String, serde_json::Value>,
}

impl StageConfiguration {
    /// The explicit empty configuration synced when a stage is deleted.
    pub fn empty(gateway_name: impl Into<String>, stage_name: impl Into<String>) -> Self {
        Self {
            gateway_name: gateway_name.into(),
            stage_name: stage_name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
            && self.services.is_empty()
            && self.plugin_metadata.is_empty()
            && self.ssls.is_empty()
    }
}

/// Errors raised while pushing configuration downstream.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Downstream rejected configuration: {0}")]
    Rejected(String),
}

/// Writes stage configuration to the proxy's store.
///
/// Implementations buffer `sync` calls until `flush` and must tolerate
/// repeated calls for the same stage.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    async fn sync(
        &self,
        gateway_name: &str,
        stage_name: &str,
        config: StageConfiguration,
    ) -> Result<(), SyncError>;

    async fn flush(&self) -> Result<(), SyncError>;

    /// Remove every stage whose `"gateway/stage"` key is not in `existing`.
    async fn remove_not_exist_stage(&self, existing: &[String]) -> Result<(), SyncError>;
}
