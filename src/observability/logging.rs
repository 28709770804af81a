//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Compact format for log shippers, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive for a configured level.
pub fn filter_directive(config: &ObservabilityConfig) -> String {
    if config.log_level.contains('=') {
        config.log_level.clone()
    } else {
        format!("gateway_operator={}", config.log_level)
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_directive(config).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.log_format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Logging already initialized");
    }
}
