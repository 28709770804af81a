//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics exporter installed by the embedding process
//! ```
//!
//! # Design Decisions
//! - Structured fields (stage, kind, retry_count) on every event
//! - Metrics are cheap (atomic increments through the facade)

pub mod logging;
pub mod metrics;
