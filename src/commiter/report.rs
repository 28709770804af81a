//! Release-status reporting.

use async_trait::async_trait;
use std::fmt;

use crate::model::StageInfo;

/// Outcome of publishing one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    Succeeded,
    Failed(String),
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseStatus::Succeeded => f.write_str("success"),
            ReleaseStatus::Failed(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// Tells the publishing side how a release ended.
#[async_trait]
pub trait ReleaseReporter: Send + Sync {
    async fn report(&self, stage: &StageInfo, status: ReleaseStatus);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

#[async_trait]
impl ReleaseReporter for LogReporter {
    async fn report(&self, stage: &StageInfo, status: ReleaseStatus) {
        match &status {
            ReleaseStatus::Succeeded => tracing::info!(
                stage = %stage,
                publish_id = stage.publish_id,
                "Release succeeded"
            ),
            ReleaseStatus::Failed(reason) => tracing::warn!(
                stage = %stage,
                publish_id = stage.publish_id,
                reason = %reason,
                "Release failed"
            ),
        }
    }
}
