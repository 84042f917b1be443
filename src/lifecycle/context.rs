//! Process-wide application context.
//!
//! # Responsibilities
//! - Own the cancellation signal, the shutdown guard and the lifecycle state
//! - Hold the service registry from Configure until teardown releases it
//! - Carry state shared between phases: hardware status, loaded plugins,
//!   background services and the log sink guard
//!
//! # Design Decisions
//! - Slots are `Mutex<Option<_>>`; each is written once and taken once
//! - Lifecycle state lives in a watch channel so observers can follow it

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

use crate::hardware::StatusBoard;
use crate::lifecycle::background::BackgroundServices;
use crate::lifecycle::cancellation::CancellationCoordinator;
use crate::lifecycle::shutdown::{teardown, ShutdownGuard};
use crate::lifecycle::state::LifecycleState;
use crate::observability::faults::FaultHandler;
use crate::plugins::PluginShelf;
use crate::services::ServiceRegistry;

fn lock<T>(slot: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AppContext {
    run_id: Uuid,
    runtime: Handle,
    cancellation: Arc<CancellationCoordinator>,
    faults: Arc<FaultHandler>,
    shutdown: ShutdownGuard,
    state: watch::Sender<LifecycleState>,
    registry: Mutex<Option<Arc<ServiceRegistry>>>,
    plugins: Arc<PluginShelf>,
    hardware_status: Arc<StatusBoard>,
    background: Mutex<Option<BackgroundServices>>,
    log_guard: Mutex<Option<WorkerGuard>>,
}

impl AppContext {
    pub fn new(runtime: Handle, faults: Arc<FaultHandler>) -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        Self {
            run_id: Uuid::new_v4(),
            runtime,
            cancellation: Arc::new(CancellationCoordinator::new()),
            faults,
            shutdown: ShutdownGuard::new(),
            state,
            registry: Mutex::new(None),
            plugins: Arc::new(PluginShelf::new()),
            hardware_status: Arc::new(StatusBoard::new()),
            background: Mutex::new(None),
            log_guard: Mutex::new(None),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn cancellation(&self) -> &Arc<CancellationCoordinator> {
        &self.cancellation
    }

    pub fn faults(&self) -> &Arc<FaultHandler> {
        &self.faults
    }

    pub fn shutdown_guard(&self) -> &ShutdownGuard {
        &self.shutdown
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Follow lifecycle state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Move to `next` if the transition is legal. Illegal transitions are
    /// logged and ignored.
    pub fn transition(&self, next: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                tracing::debug!(from = %current, to = %next, "Lifecycle transition");
                *current = next;
                true
            } else {
                tracing::warn!(from = %current, to = %next, "Illegal lifecycle transition ignored");
                false
            }
        })
    }

    pub(crate) fn install_registry(&self, registry: Arc<ServiceRegistry>) {
        *lock(&self.registry) = Some(registry);
    }

    /// The registry, between Configure and teardown.
    pub fn registry(&self) -> Option<Arc<ServiceRegistry>> {
        lock(&self.registry).clone()
    }

    pub(crate) fn release_registry(&self) {
        lock(&self.registry).take();
    }

    pub fn plugins(&self) -> &Arc<PluginShelf> {
        &self.plugins
    }

    pub fn hardware_status(&self) -> &Arc<StatusBoard> {
        &self.hardware_status
    }

    pub(crate) fn set_background(&self, background: BackgroundServices) {
        *lock(&self.background) = Some(background);
    }

    pub(crate) fn take_background(&self) -> Option<BackgroundServices> {
        lock(&self.background).take()
    }

    pub(crate) fn set_log_guard(&self, guard: WorkerGuard) {
        *lock(&self.log_guard) = Some(guard);
    }

    pub(crate) fn take_log_guard(&self) -> Option<WorkerGuard> {
        lock(&self.log_guard).take()
    }

    /// Run teardown unless another caller already has.
    ///
    /// Safe to call from any number of tasks concurrently; returns true for
    /// the single caller that executed the teardown.
    pub async fn shutdown(&self) -> bool {
        self.shutdown.run_once(|| teardown(self)).await
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("run_id", &self.run_id)
            .field("state", &self.state())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
