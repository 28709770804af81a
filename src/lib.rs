//! Gateway operator control-plane core.

pub mod agent;
pub mod commiter;
pub mod config;
pub mod convert;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod radixtree;
pub mod registry;
pub mod synchronizer;

pub use agent::{AgentError, EventAgent, StageTimer};
pub use commiter::{commit_channel, CommitSender, Commiter, StageCommitter};
pub use config::OperatorConfig;
pub use lifecycle::Shutdown;
pub use model::{ResourceKind, ResourceMetadata, StageInfo};
