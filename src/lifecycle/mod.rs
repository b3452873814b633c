//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Selection → Load config → SharedState → Attach plugins
//!         → Action (run once, exit)   or   Services (launch, park)
//!
//! Supervision (supervisor.rs):
//!     ServiceGroup → one task per service → log exits and panics
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then shared handles, then plugins
//! - Everything before launch runs on one task, strictly in sequence
//! - No shutdown state machine; the process ends on an external signal

pub mod selection;
pub mod startup;
pub mod supervisor;

pub use selection::{Mode, Selection};
pub use startup::{run, Outcome, StartupError};
pub use supervisor::ServiceGroup;
