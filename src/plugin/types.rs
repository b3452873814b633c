use thiserror::Error;

use crate::session::SessionError;
use crate::store::{PoolError, StoreError};

/// Plugin errors with structured variants
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    #[error("route '{0}' is already mounted")]
    DuplicateRoute(String),

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("plugin '{plugin}' failed to attach: {source}")]
    Attach {
        plugin: &'static str,
        #[source]
        source: Box<PluginError>,
    },

    #[error("plugin runtime error: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl PluginError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            source: None,
        }
    }
}
