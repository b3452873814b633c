//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt layer, optional timestamps)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Services report failures here and nowhere else
//! - Metrics are cheap and safe to record before the exporter exists

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogOptions};
