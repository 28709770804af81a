//! Declarative resource store.
//!
//! # Data Flow
//! ```text
//! CRDs / etcd keys
//!     → Registry (get, list, list_stages)
//!     → Registry::watch → ResourceMetadata stream → EventAgent
//! ```
//!
//! # Design Decisions
//! - Not-found is a distinct error variant; callers branch on it
//! - Watch lifetime is bound to a cancellation token

pub mod memory;
pub mod types;

pub use memory::MemoryRegistry;
pub use types::{Registry, RegistryError, RegistryResult};
