//! Stage identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-commit flags travelling with a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageContext {
    /// Suppress release-status reporting for this commit (bootstrap resyncs).
    #[serde(default)]
    pub skip_report: bool,
}

/// A deploy environment within a gateway; the unit of commit.
///
/// Both names empty is the "all stages" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub gateway_name: String,
    pub stage_name: String,
    #[serde(default)]
    pub publish_id: i64,
    #[serde(default)]
    pub ctx: StageContext,
}

impl StageInfo {
    pub fn new(gateway_name: impl Into<String>, stage_name: impl Into<String>) -> Self {
        Self {
            gateway_name: gateway_name.into(),
            stage_name: stage_name.into(),
            publish_id: 0,
            ctx: StageContext::default(),
        }
    }

    /// The "all stages" sentinel.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_publish_id(mut self, publish_id: i64) -> Self {
        self.publish_id = publish_id;
        self
    }

    /// Same stage with release reporting suppressed.
    pub fn without_report(mut self) -> Self {
        self.ctx.skip_report = true;
        self
    }

    /// Copy to re-queue after a failed commit; the retry reports its outcome.
    pub fn for_retry(&self) -> Self {
        let mut retry = self.clone();
        retry.ctx.skip_report = false;
        retry
    }

    /// Map key, `"gateway/stage"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.gateway_name, self.stage_name)
    }

    pub fn is_empty(&self) -> bool {
        self.gateway_name.is_empty() && self.stage_name.is_empty()
    }

    /// True when both refer to the same gateway/stage, ignoring payload.
    pub fn same_stage(&self, other: &StageInfo) -> bool {
        self.gateway_name == other.gateway_name && self.stage_name == other.stage_name
    }
}

impl fmt::Display for StageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gateway_name, self.stage_name)
    }
}
