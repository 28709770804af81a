//! Per-stage debounce timer.
//!
//! # Responsibilities
//! - Coalesce bursts of updates for one stage into a single commit
//! - Bound staleness under continuous churn with a force window
//! - Hand out due stages atomically (scan-and-remove)

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::AgentConfig;
use crate::model::StageInfo;
use crate::observability::metrics;

/// Pending commit state for one stage.
#[derive(Debug, Clone)]
struct CacheTimer {
    stage: StageInfo,
    /// When the stage first became pending. Never reset by updates.
    cached_time: Instant,
    should_commit_time: Instant,
}

impl CacheTimer {
    fn is_due(&self, now: Instant, force_window: Duration) -> bool {
        now > self.should_commit_time || now.duration_since(self.cached_time) > force_window
    }
}

/// Debounce store keyed by `"gateway/stage"`.
#[derive(Debug)]
pub struct StageTimer {
    timers: DashMap<String, CacheTimer>,
    debounce_window: Duration,
    force_window: Duration,
}

impl StageTimer {
    pub fn new(debounce_window: Duration, force_window: Duration) -> Self {
        Self {
            timers: DashMap::new(),
            debounce_window,
            force_window,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.debounce_window(), config.force_window())
    }

    /// Mark `stage` as changed. The latest payload wins.
    pub fn update(&self, stage: StageInfo) {
        let now = Instant::now();
        let should_commit_time = now + self.debounce_window;
        match self.timers.entry(stage.key()) {
            Entry::Occupied(mut entry) => {
                let timer = entry.get_mut();
                timer.stage = stage;
                timer.should_commit_time = should_commit_time;
            }
            Entry::Vacant(entry) => {
                tracing::trace!(stage = %stage, "Stage pending commit");
                entry.insert(CacheTimer {
                    stage,
                    cached_time: now,
                    should_commit_time,
                });
            }
        }
    }

    /// Remove and return every stage whose debounce or force window elapsed.
    pub fn list_stages_for_commit(&self) -> Vec<StageInfo> {
        let now = Instant::now();
        let force_window = self.force_window;
        let mut due = Vec::new();
        self.timers.retain(|_, timer| {
            if timer.is_due(now, force_window) {
                due.push(timer.stage.clone());
                false
            } else {
                true
            }
        });
        metrics::record_pending_stages(self.timers.len());
        due
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
