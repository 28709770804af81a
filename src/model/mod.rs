//! Core data model shared by every subsystem.
//!
//! # Data Flow
//! ```text
//! Registry watch
//!     → ResourceMetadata (one change, transient)
//!     → StageInfo (unit of commit, keyed "gateway/stage")
//!     → ResourceKey (registry lookup / certificate identity)
//! ```

pub mod resource;
pub mod stage;

pub use resource::{
    Resource, ResourceKey, ResourceKind, ResourceMetadata, SecretData, TlsBindingSpec,
};
pub use stage::{StageContext, StageInfo};
