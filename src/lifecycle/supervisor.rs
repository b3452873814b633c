//! Service supervision.
//!
//! Services run as tasks in a single `JoinSet`. The supervisor never stops
//! them; it only reports how each one ended.

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinSet;

use crate::observability::metrics;
use crate::services::Service;
use crate::state::SharedState;

/// Task group holding every launched service.
#[derive(Default)]
pub struct ServiceGroup {
    tasks: JoinSet<()>,
    launched: Vec<&'static str>,
}

impl ServiceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `service` as an independent task.
    pub fn launch(&mut self, service: Box<dyn Service>, state: SharedState) {
        let name = service.name();
        tracing::info!(service = name, "Launching service");
        metrics::record_service_launched(name);

        self.tasks.spawn(async move {
            match AssertUnwindSafe(service.run(state)).catch_unwind().await {
                Ok(Ok(())) => tracing::warn!(service = name, "Service exited"),
                Ok(Err(e)) => tracing::error!(service = name, error = %e, "Service failed"),
                Err(panic) => tracing::error!(
                    service = name,
                    panic = panic_message(panic.as_ref()),
                    "Service panicked"
                ),
            }
        });
        self.launched.push(name);
    }

    /// Names of launched services, in launch order.
    pub fn launched(&self) -> &[&'static str] {
        &self.launched
    }

    /// Block forever.
    ///
    /// Services that end are reaped as they finish; once none are left the
    /// task keeps waiting, since only an external signal ends the process.
    pub async fn park(mut self) -> Infallible {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Service task aborted");
            }
        }
        if !self.launched.is_empty() {
            tracing::warn!(services = ?self.launched, "All services have stopped");
        }
        std::future::pending::<Infallible>().await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
