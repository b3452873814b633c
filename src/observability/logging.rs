//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to `info` for this crate
//! - Optionally omit timestamps (supervisors usually add their own)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging options resolved from CLI flags.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Include timestamps in each log line.
    pub timestamps: bool,
    /// Default level for this crate when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            timestamps: false,
            level: "info".to_string(),
        }
    }
}

/// Build the filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    format!("guildbot={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(options: &LogOptions) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&options.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    let result = if options.timestamps {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().without_time())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
