//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the operator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the gateway operator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OperatorConfig {
    /// Event loop, debounce and retry settings.
    pub agent: AgentConfig,

    /// Commit batching settings.
    pub commiter: CommiterConfig,

    /// Certificate index settings.
    pub tls: TlsConfig,

    /// Resource store settings.
    pub registry: RegistryConfig,

    /// Downstream writer settings.
    pub synchronizer: SynchronizerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Event agent configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Quiet period after the last change before a stage commits.
    pub debounce_window_ms: u64,

    /// Upper bound on how long a stage may wait under continuous churn.
    pub force_window_ms: u64,

    /// How often pending stages are drained.
    pub tick_interval_ms: u64,

    /// Attempts to (re)build the registry watch before giving up.
    pub retry_limit: u32,

    /// Fixed delay between watch rebuild attempts.
    pub retry_delay_secs: u64,

    /// Delay before a failed certificate event is retried.
    pub event_retry_delay_ms: u64,

    /// Retries per event before it is dropped.
    pub max_event_retries: u32,

    /// Capacity of the retry queue.
    pub max_pending_retries: usize,
}

impl AgentConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn force_window(&self) -> Duration {
        Duration::from_millis(self.force_window_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn event_retry_delay(&self) -> Duration {
        Duration::from_millis(self.event_retry_delay_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 2_000,
            force_window_ms: 10_000,
            tick_interval_ms: 1_000,
            retry_limit: 3,
            retry_delay_secs: 2,
            event_retry_delay_ms: 5_000,
            max_event_retries: 3,
            max_pending_retries: 1_024,
        }
    }
}

/// Commiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommiterConfig {
    /// Stages committed concurrently before one flush.
    pub segment_size: usize,

    /// Pending batches on the commit channel.
    pub channel_capacity: usize,
}

impl Default for CommiterConfig {
    fn default() -> Self {
        Self {
            segment_size: 10,
            channel_capacity: 128,
        }
    }
}

/// Certificate index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Keep one radix tree per stage instead of one shared tree.
    pub per_stage_tree: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            per_stage_tree: true,
        }
    }
}

/// Resource store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Optional JSON file of resources loaded at startup.
    pub seed_file: Option<PathBuf>,
}

/// Downstream writer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SynchronizerConfig {
    /// Directory receiving one JSON document per stage.
    pub output_dir: PathBuf,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log line format: "pretty" or "compact".
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
