//! TLS certificate resolution by SNI.
//!
//! # Data Flow
//! ```text
//! Secret / TLS binding event
//!     → cert.rs (PEM material, SNI derivation, encrypted-key check)
//!     → suffix.rs (reverse-encode SNIs, register owners)
//!     → trie.rs (compressed radix trie, longest-prefix lookup)
//!
//! Handshake hostname
//!     → reverse-encode with terminator
//!     → longest prefix → SNI → owner certificates
//! ```
//!
//! # Design Decisions
//! - Wildcards cover any subdomain depth but never the bare apex
//! - Policy rejections (encrypted key, no SNI) are `Ok(false)`, not errors
//! - One lock per tree; certificate churn is rare next to route churn

pub mod cert;
pub mod getter;
pub mod suffix;
pub mod trie;

pub use cert::{CertError, TlsCert};
pub use getter::{new_getter, PerStageRadixTreeGetter, RadixTreeGetter, SingleRadixTreeGetter};
pub use suffix::SuffixRadixTree;

use std::sync::Arc;

use crate::model::ResourceKey;

/// All certificates claiming the matched SNI.
#[derive(Debug, Clone)]
pub struct SniMatch {
    pub sni: String,
    pub certs: Vec<Arc<TlsCert>>,
}

/// One certificate claiming the matched SNI.
#[derive(Debug, Clone)]
pub struct CertMatch {
    pub sni: String,
    pub cert: Arc<TlsCert>,
}

/// Certificate index keyed by SNI pattern.
///
/// `insert`/`update` return whether the served material changed; callers
/// use that to decide if the stage needs a re-commit.
pub trait RadixTree: Send + Sync {
    fn insert(&self, obj: &ResourceKey, cert: TlsCert) -> Result<bool, CertError>;

    fn update(&self, obj: &ResourceKey, cert: TlsCert) -> Result<bool, CertError>;

    /// Returns false if `obj` was not tracked.
    fn delete(&self, obj: &ResourceKey) -> bool;

    fn match_longest_prefix(&self, host: &str) -> Option<SniMatch>;

    /// Arbitrary choice among owners of the matched SNI.
    fn match_longest_prefix_with_random_cert(&self, host: &str) -> Option<CertMatch>;
}
