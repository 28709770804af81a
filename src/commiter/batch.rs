//! Batch consumer.
//!
//! # Responsibilities
//! - Receive stage batches from the agent (debounced) or operators (forced)
//! - Split each batch into segments and commit a segment's stages concurrently
//! - Flush once per segment, then report release outcomes

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::commiter::report::ReleaseStatus;
use crate::commiter::stage::{CommitError, StageCommitter};
use crate::model::StageInfo;
use crate::observability::metrics;

/// Producer side of the commit channel.
#[derive(Debug, Clone)]
pub struct CommitSender {
    tx: mpsc::Sender<Vec<StageInfo>>,
}

impl CommitSender {
    /// Queue a batch of stages for commit.
    pub async fn send(&self, stages: Vec<StageInfo>) -> Result<(), CommitError> {
        if stages.is_empty() {
            return Ok(());
        }
        self.tx
            .send(stages)
            .await
            .map_err(|_| CommitError::ChannelClosed)
    }

    /// Commit `stages` without waiting for the debounce window.
    pub async fn force_commit(&self, stages: Vec<StageInfo>) -> Result<(), CommitError> {
        tracing::info!(stages = stages.len(), "Force commit requested");
        self.send(stages).await
    }
}

/// Create a bounded commit channel.
pub fn commit_channel(capacity: usize) -> (CommitSender, mpsc::Receiver<Vec<StageInfo>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommitSender { tx }, rx)
}

/// Single consumer of the commit channel.
pub struct Commiter {
    committer: Arc<StageCommitter>,
    rx: mpsc::Receiver<Vec<StageInfo>>,
    segment_size: usize,
}

impl Commiter {
    pub fn new(
        committer: Arc<StageCommitter>,
        rx: mpsc::Receiver<Vec<StageInfo>>,
        segment_size: usize,
    ) -> Self {
        Self {
            committer,
            rx,
            segment_size: segment_size.max(1),
        }
    }

    /// Consume batches until shutdown or until every sender is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(segment_size = self.segment_size, "Commiter starting");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Commiter received shutdown signal, exiting loop");
                    break;
                }
                batch = self.rx.recv() => match batch {
                    Some(stages) => self.commit_batch(stages).await,
                    None => {
                        tracing::info!("Commit channel closed, exiting loop");
                        break;
                    }
                },
            }
        }
    }

    /// Commit a batch segment by segment; segments never overlap.
    pub async fn commit_batch(&self, stages: Vec<StageInfo>) {
        tracing::debug!(stages = stages.len(), "Committing batch");
        for segment in stages.chunks(self.segment_size) {
            self.commit_segment(segment).await;
        }
    }

    async fn commit_segment(&self, segment: &[StageInfo]) {
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, StageInfo> = HashMap::new();
        for stage in segment {
            if stage.is_empty() {
                tracing::warn!("Skipping all-stages sentinel in commit batch");
                continue;
            }
            let committer = self.committer.clone();
            let owned = stage.clone();
            let handle = tasks.spawn(async move { committer.commit_stage(&owned).await });
            in_flight.insert(handle.id(), stage.clone());
        }
        if tasks.is_empty() {
            return;
        }

        let mut committed = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    let Some(stage) = in_flight.remove(&id) else {
                        continue;
                    };
                    match result {
                        Ok(()) => committed.push(stage),
                        Err(e) => failed.push((stage, e.to_string())),
                    }
                }
                Err(e) => {
                    let Some(stage) = in_flight.remove(&e.id()) else {
                        tracing::error!(error = %e, "Commit task failed for unknown stage");
                        continue;
                    };
                    tracing::error!(stage = %stage, error = %e, "Commit task panicked, requeueing stage");
                    metrics::record_commit("failed");
                    self.committer.timer().update(stage.for_retry());
                    failed.push((stage, format!("commit task panicked: {e}")));
                }
            }
        }

        match self.committer.synchronizer().flush().await {
            Ok(()) => {
                metrics::record_flush(true);
                for stage in &committed {
                    self.committer.report(stage, ReleaseStatus::Succeeded).await;
                }
            }
            Err(e) => {
                metrics::record_flush(false);
                tracing::error!(
                    stages = committed.len(),
                    error = %e,
                    "Flush failed, requeueing segment"
                );
                let reason = e.to_string();
                for stage in &committed {
                    self.committer.timer().update(stage.for_retry());
                    self.committer
                        .report(stage, ReleaseStatus::Failed(reason.clone()))
                        .await;
                }
            }
        }

        for (stage, reason) in failed {
            self.committer.report(&stage, ReleaseStatus::Failed(reason)).await;
        }
    }
}
