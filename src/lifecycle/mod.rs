//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build collaborators → Spawn commiter → Run agent
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel tokens → Loops return → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: a broken watch baseline ends the process
//! - Every loop observes its cancellation token

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
