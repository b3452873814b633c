//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! REST request fails:
//!     → retries.rs (is the status / error retryable?)
//!     → backoff.rs (how long to wait before attempt N)
//!
//! Resident loop disconnects:
//!     → backoff.rs (reconnect delay, reset after a healthy session)
//! ```
//!
//! # Design Decisions
//! - Bounded attempts for REST calls; resident loops retry forever
//! - Delays carry up to 10% random jitter

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
