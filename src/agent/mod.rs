//! Event agent subsystem.
//!
//! # Data Flow
//! ```text
//! Registry::watch
//!     → EventAgent::handle_event
//!         → Instance: ignored
//!         → Secret / TLS binding / resync: certificate index (retry.rs on failure)
//!         → everything else: StageTimer::update
//!
//! Ticker
//!     → StageTimer::list_stages_for_commit (timer.rs)
//!     → CommitSender (commiter)
//! ```
//!
//! # Design Decisions
//! - One task owns the watch, the retry queue and the ticker
//! - Only the timer and the radix trees are shared with other tasks
//! - A watch that cannot be rebuilt is fatal

pub mod event_agent;
pub mod retry;
pub mod timer;

pub use event_agent::{virtual_tls_key, AgentError, EventAgent, VIRTUAL_TLS_PREFIX};
pub use retry::RetryQueue;
pub use timer::StageTimer;
