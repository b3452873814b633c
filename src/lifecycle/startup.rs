//! Startup orchestration.
//!
//! # Responsibilities
//! - Reject an empty selection before touching configuration
//! - Load configuration and build the shared state
//! - Attach plugins, then run an action or launch services
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Services start last, only once every plugin has attached

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use super::selection::Mode;
use super::supervisor::ServiceGroup;
use crate::actions;
use crate::cli::Cli;
use crate::config::{load_config, ConfigError};
use crate::observability::metrics;
use crate::plugin::{PluginError, PluginRegistry};
use crate::plugins;
use crate::services;
use crate::state::{InitError, SharedState};

/// Exit code used when nothing was selected.
pub const USAGE_EXIT_CODE: u8 = 2;

/// How a run that returned ended. Service mode never returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NothingSelected,
    ActionSucceeded,
    ActionFailed,
}

impl Outcome {
    /// Numeric process exit status.
    pub fn code(&self) -> u8 {
        match self {
            Outcome::NothingSelected => USAGE_EXIT_CODE,
            Outcome::ActionSucceeded => 0,
            Outcome::ActionFailed => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid listen address '{address}': {source}")]
    ListenAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error(transparent)]
    Init(#[from] InitError),

    #[error("plugin attachment failed: {0}")]
    Plugins(#[from] PluginError),
}

/// Run the process as described by `cli` with the built-in plugins.
pub async fn run(cli: &Cli) -> Result<Outcome, StartupError> {
    run_with(cli, plugins::builtin()).await
}

/// Run the process as described by `cli`, attaching `registry`.
pub async fn run_with(cli: &Cli, registry: PluginRegistry) -> Result<Outcome, StartupError> {
    let selection = cli.selection();
    if selection.is_empty() {
        tracing::error!("Nothing to do: pass --all, a service flag (--bot, --web, --reddit, --stats) or --action");
        return Ok(Outcome::NothingSelected);
    }

    let state = initialize(cli).await?;
    let hooks = Arc::new(registry.attach_all(&state)?);

    match selection.mode() {
        Mode::Idle => Ok(Outcome::NothingSelected),
        Mode::Action(name) => match actions::run_action(&state, &name).await {
            Ok(()) => Ok(Outcome::ActionSucceeded),
            Err(_) => Ok(Outcome::ActionFailed),
        },
        Mode::Services(kinds) => {
            let mut group = ServiceGroup::new();
            for kind in kinds {
                group.launch(services::build(kind, &hooks), state.clone());
            }
            tracing::info!(services = ?group.launched(), "Services launched");
            match group.park().await {}
        }
    }
}

/// Load configuration, apply flag overrides and build the shared state.
pub async fn initialize(cli: &Cli) -> Result<SharedState, StartupError> {
    let mut config = load_config(&cli.conf)?;
    tracing::info!(path = %cli.conf.display(), "Configuration loaded");

    if let Some(addr) = &cli.addr {
        addr.parse::<SocketAddr>()
            .map_err(|source| StartupError::ListenAddress {
                address: addr.clone(),
                source,
            })?;
        config.web.listen_address = addr.clone();
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = SharedState::initialize(config).await?;
    tracing::info!(
        session = %state.session().id(),
        pool_size = state.pool().max_size(),
        "Shared state initialized"
    );
    Ok(state)
}
