//! Resource to downstream-configuration conversion.
//!
//! # Data Flow
//! ```text
//! Registry (stage entity + stage-scoped lists)
//!     → StageResources
//!     → Converter::convert (pure)
//!     → StageConfiguration → Synchronizer
//! ```

pub mod default;

pub use default::DefaultConverter;

use thiserror::Error;

use crate::model::{Resource, ResourceKind, StageInfo};
use crate::synchronizer::StageConfiguration;

/// Everything the registry holds for one stage, read fresh per commit.
#[derive(Debug, Clone)]
pub struct StageResources {
    pub stage: Resource,
    pub routes: Vec<Resource>,
    pub services: Vec<Resource>,
    pub plugin_metadata: Vec<Resource>,
    pub tls_bindings: Vec<Resource>,
    pub secrets: Vec<Resource>,
}

impl StageResources {
    pub fn new(stage: Resource) -> Self {
        Self {
            stage,
            routes: Vec::new(),
            services: Vec::new(),
            plugin_metadata: Vec::new(),
            tls_bindings: Vec::new(),
            secrets: Vec::new(),
        }
    }

    /// Append listed objects to the bucket for `kind`.
    pub fn extend(&mut self, kind: &ResourceKind, resources: Vec<Resource>) {
        let bucket = match kind {
            ResourceKind::Route => &mut self.routes,
            ResourceKind::Service => &mut self.services,
            ResourceKind::PluginMetadata => &mut self.plugin_metadata,
            ResourceKind::TlsBinding => &mut self.tls_bindings,
            ResourceKind::Secret => &mut self.secrets,
            other => {
                tracing::debug!(kind = %other, "Ignoring resources of non stage-scoped kind");
                return;
            }
        };
        bucket.extend(resources);
    }
}

/// Errors raised during conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid {kind} {name}: {reason}")]
    InvalidResource {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("TLS binding {binding} references missing secret {secret}")]
    MissingSecret { binding: String, secret: String },
}

/// Pure conversion from registry objects to proxy configuration.
pub trait Converter: Send + Sync {
    fn convert(
        &self,
        stage: &StageInfo,
        resources: &StageResources,
    ) -> Result<StageConfiguration, ConvertError>;
}
