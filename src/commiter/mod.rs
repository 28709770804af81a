//! Commit pipeline.
//!
//! # Data Flow
//! ```text
//! EventAgent / force_commit
//!     → CommitSender (bounded channel of Vec<StageInfo>)
//!     → Commiter::run (single consumer)
//!         → split batch into segments
//!         → per segment: one task per stage (StageCommitter::commit_stage)
//!         → join, then exactly one Synchronizer::flush
//!         → ReleaseReporter outcome per stage
//! ```
//!
//! # Design Decisions
//! - Batches and segments are strictly sequential; flushes never race
//! - One stage's failure never fails its siblings
//! - Failed stages go back through the debounce timer

pub mod batch;
pub mod report;
pub mod stage;

pub use batch::{commit_channel, CommitSender, Commiter};
pub use report::{LogReporter, ReleaseReporter, ReleaseStatus};
pub use stage::{CommitError, StageCommitter};
