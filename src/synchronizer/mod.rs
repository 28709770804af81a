//! Downstream configuration writer.
//!
//! # Data Flow
//! ```text
//! Commiter
//!     → Synchronizer::sync (buffered per stage)
//!     → Synchronizer::flush (once per commit segment)
//!
//! Bootstrap:
//!     → Synchronizer::remove_not_exist_stage (drop deleted stages)
//! ```

pub mod file;
pub mod types;

pub use file::FileSynchronizer;
pub use types::{StageConfiguration, SyncError, Synchronizer};
