//! Shutdown coordination.
//!
//! # Teardown order
//! ```text
//! 1. request cancellation
//! 2. stop registered services (reverse registration order, each bounded)
//! 3. stop background services (bounded)
//! 4. release registry and flush logging
//! ```
//!
//! # Design Decisions
//! - The guard flag is the only mutex-protected lifecycle state
//! - Every step is best effort; a failing step never blocks the next
//! - Callers after the first return immediately instead of waiting

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::timeout;

use crate::lifecycle::cancellation::CancelReason;
use crate::lifecycle::context::AppContext;
use crate::lifecycle::state::LifecycleState;
use crate::observability::faults::catch_panic;
use crate::services::ServiceHandle;

/// Background stop budget used when no configuration was loaded.
pub const DEFAULT_BACKGROUND_STOP: Duration = Duration::from_secs(5);

/// Runs teardown at most once per process lifetime.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    started: Mutex<bool>,
    executions: AtomicUsize,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `teardown` if no caller has done so yet.
    ///
    /// Returns true for the caller that ran the teardown.
    pub async fn run_once<F, Fut>(&self, teardown: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        {
            let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
            if *started {
                return false;
            }
            *started = true;
        }

        self.executions.fetch_add(1, Ordering::SeqCst);
        teardown().await;
        true
    }

    /// Whether teardown has been claimed.
    pub fn has_started(&self) -> bool {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How many times a teardown body has executed. Never exceeds one.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

/// The teardown body executed by [`AppContext::shutdown`].
pub(crate) async fn teardown(ctx: &AppContext) {
    tracing::info!(run_id = %ctx.run_id(), "Shutting down");
    ctx.transition(LifecycleState::ShuttingDown);

    ctx.cancellation().request(CancelReason::Shutdown);

    let registry = ctx.registry();
    let background_budget = registry
        .as_ref()
        .map(|registry| registry.config().timeouts.background_stop())
        .unwrap_or(DEFAULT_BACKGROUND_STOP);

    if let Some(registry) = &registry {
        for handle in registry.handles().iter().rev() {
            stop_service(handle).await;
        }
    }

    if let Some(background) = ctx.take_background() {
        background.stop(background_budget).await;
    }

    drop(registry);
    ctx.release_registry();
    ctx.transition(LifecycleState::Stopped);
    tracing::info!("Shutdown complete");

    // Dropping the guard flushes the file sink; nothing is logged after this.
    drop(ctx.take_log_guard());
}

async fn stop_service(handle: &ServiceHandle) {
    let budget = handle.stop_timeout();
    match timeout(budget, catch_panic(handle.service().stop())).await {
        Ok(Ok(Ok(()))) => {
            tracing::debug!(service = %handle.name(), "Service stopped");
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(service = %handle.name(), error = %e, "Service failed to stop cleanly");
        }
        Ok(Err(panic)) => {
            tracing::error!(service = %handle.name(), panic = %panic, "Service panicked while stopping");
        }
        Err(_) => {
            tracing::warn!(service = %handle.name(), budget = ?budget, "Service stop timed out");
        }
    }
}
