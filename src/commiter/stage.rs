//! Single-stage commit.
//!
//! # Responsibilities
//! - Read the stage entity and its resources fresh from the registry
//! - Convert them and hand the result to the synchronizer
//! - Turn a deleted stage into an explicit empty configuration
//! - Re-queue failed stages through the debounce timer

use std::sync::Arc;
use thiserror::Error;

use crate::agent::timer::StageTimer;
use crate::commiter::report::{ReleaseReporter, ReleaseStatus};
use crate::convert::{ConvertError, Converter, StageResources};
use crate::model::{ResourceKey, ResourceKind, StageInfo};
use crate::observability::metrics;
use crate::registry::{Registry, RegistryError};
use crate::synchronizer::{StageConfiguration, SyncError, Synchronizer};

/// Errors raised while committing a stage.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The stage entity no longer exists.
    #[error("Stage {0} not found")]
    StageNotFound(StageInfo),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// The commit channel has no consumer.
    #[error("Commit channel closed")]
    ChannelClosed,
}

/// Converts and syncs one stage at a time; shared by every commit task.
pub struct StageCommitter {
    registry: Arc<dyn Registry>,
    converter: Arc<dyn Converter>,
    synchronizer: Arc<dyn Synchronizer>,
    timer: Arc<StageTimer>,
    reporter: Arc<dyn ReleaseReporter>,
}

impl StageCommitter {
    pub fn new(
        registry: Arc<dyn Registry>,
        converter: Arc<dyn Converter>,
        synchronizer: Arc<dyn Synchronizer>,
        timer: Arc<StageTimer>,
        reporter: Arc<dyn ReleaseReporter>,
    ) -> Self {
        Self {
            registry,
            converter,
            synchronizer,
            timer,
            reporter,
        }
    }

    pub fn synchronizer(&self) -> &Arc<dyn Synchronizer> {
        &self.synchronizer
    }

    pub fn timer(&self) -> &Arc<StageTimer> {
        &self.timer
    }

    /// Build the stage's configuration from current registry contents.
    ///
    /// The stage entity is stored under kind `Stage` named after the stage.
    pub async fn build_configuration(
        &self,
        stage: &StageInfo,
    ) -> Result<StageConfiguration, CommitError> {
        let stage_key = ResourceKey::new(stage.clone(), stage.stage_name.clone());
        let entity = match self.registry.get(ResourceKind::Stage, &stage_key).await {
            Ok(entity) => entity,
            Err(e) if e.is_not_found() => return Err(CommitError::StageNotFound(stage.clone())),
            Err(e) => return Err(e.into()),
        };

        let mut resources = StageResources::new(entity);
        for kind in ResourceKind::STAGE_SCOPED {
            let listed = self.registry.list(kind.clone(), stage).await?;
            resources.extend(&kind, listed);
        }

        Ok(self.converter.convert(stage, &resources)?)
    }

    /// Convert and sync one stage. Nothing is flushed here.
    pub async fn commit_stage(&self, stage: &StageInfo) -> Result<(), CommitError> {
        let (config, outcome) = match self.build_configuration(stage).await {
            Ok(config) => (config, "synced"),
            Err(CommitError::StageNotFound(_)) => {
                tracing::info!(stage = %stage, "Stage deleted, syncing empty configuration");
                let empty = StageConfiguration::empty(&stage.gateway_name, &stage.stage_name);
                (empty, "deleted")
            }
            Err(e) => {
                tracing::error!(stage = %stage, error = %e, "Failed to build stage configuration, requeueing");
                metrics::record_commit("failed");
                self.timer.update(stage.for_retry());
                return Err(e);
            }
        };

        if let Err(e) = self
            .synchronizer
            .sync(&stage.gateway_name, &stage.stage_name, config)
            .await
        {
            tracing::error!(stage = %stage, error = %e, "Failed to sync stage configuration, requeueing");
            metrics::record_commit("failed");
            self.timer.update(stage.for_retry());
            return Err(e.into());
        }

        metrics::record_commit(outcome);
        tracing::debug!(stage = %stage, publish_id = stage.publish_id, outcome, "Stage synced");
        Ok(())
    }

    /// Report a release outcome unless the stage opted out.
    pub async fn report(&self, stage: &StageInfo, status: ReleaseStatus) {
        if stage.ctx.skip_report {
            return;
        }
        self.reporter.report(stage, status).await;
    }
}
