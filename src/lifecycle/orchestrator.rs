//! Startup sequencing.
//!
//! # Data Flow
//! ```text
//! Configure          load layers → validate → logging → build registry
//! InitCoreServices   initialize core services in registration order
//! InitHardware       initialize each subsystem; failures degrade
//! LoadPlugins        discover + build plugins; publish all or nothing
//! StartUi            start background services → hand the thread to the shell
//! (always)           ShutdownGuard-protected teardown
//! ```
//!
//! # Design Decisions
//! - Async phases run on the runtime via `block_on`; the shell runs on the
//!   calling thread
//! - Every async phase races the cancellation signal and its deadline;
//!   InitHardware applies the deadline per subsystem instead, so one hung
//!   device never keeps the others from initializing
//! - Panics in a phase are caught and treated as phase failures, so
//!   teardown always runs

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::config::{load_layered, ConfigSources, TimeoutConfig};
use crate::hardware::{self, HardwareProvider, SubsystemStatus};
use crate::health::{HardwareProbe, HealthRegistry, PluginsProbe, SystemProbe};
use crate::lifecycle::background::BackgroundServices;
use crate::lifecycle::cancellation::CancelReason;
use crate::lifecycle::context::AppContext;
use crate::lifecycle::phase::{
    error_chain, FailurePolicy, PhaseError, PhaseKind, PhaseOutcome, PhaseRecord, RunReport,
    EXIT_FAILURE, EXIT_SUCCESS,
};
use crate::observability::faults::{catch_panic, panic_message, FaultHandler, ObservedScope};
use crate::observability::{logging, metrics};
use crate::plugins::{PluginCatalog, PluginDiscovery};
use crate::services::{
    AppStateTracker, ConfigProvider, Service, ServiceRegistry, ServiceRegistryBuilder,
    SystemMonitor,
};
use crate::ui::{UiContext, UiShell};

/// Inputs for one run of the host.
pub struct Launch {
    pub sources: ConfigSources,
    pub catalog: Arc<PluginCatalog>,
    pub hardware: HardwareProvider,
    /// Core services registered after the built-in ones.
    pub core_services: Vec<Arc<dyn Service>>,
    /// Install the global log subscriber during Configure.
    pub init_logging: bool,
}

impl Launch {
    pub fn new(sources: ConfigSources) -> Self {
        Self {
            sources,
            catalog: Arc::new(PluginCatalog::with_builtins()),
            hardware: hardware::default_provider(),
            core_services: Vec::new(),
            init_logging: true,
        }
    }

    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_hardware(mut self, provider: HardwareProvider) -> Self {
        self.hardware = provider;
        self
    }

    pub fn with_core_service(mut self, service: Arc<dyn Service>) -> Self {
        self.core_services.push(service);
        self
    }

    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }
}

/// Drives the phases in order and guarantees teardown.
pub struct Orchestrator {
    ctx: Arc<AppContext>,
    launch: Launch,
}

impl Orchestrator {
    pub fn new(runtime: Handle, faults: Arc<FaultHandler>, launch: Launch) -> Self {
        Self {
            ctx: Arc::new(AppContext::new(runtime, faults)),
            launch,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Run every phase, then tear down. Blocks the calling thread, which
    /// must not be a runtime worker.
    pub fn run(&self, ui: &dyn UiShell) -> RunReport {
        let mut records = Vec::with_capacity(PhaseKind::ALL.len());
        let mut exit_code = EXIT_SUCCESS;
        let mut phases = PhaseKind::ALL.into_iter();

        for kind in phases.by_ref() {
            if self.ctx.cancellation().is_cancelled() {
                tracing::info!(phase = %kind, "Skipping phase, cancellation requested");
                records.push(skipped(kind));
                continue;
            }

            self.ctx.transition(kind.state());
            tracing::info!(phase = %kind, "Phase starting");
            let started = Instant::now();
            let outcome = self.run_phase(kind, ui);
            let elapsed = started.elapsed();
            metrics::record_phase(kind.as_str(), outcome.label(), elapsed);
            log_outcome(kind, &outcome, elapsed);

            let fatal = outcome.is_fatal();
            records.push(PhaseRecord { kind, outcome, elapsed });
            if fatal {
                exit_code = EXIT_FAILURE;
                break;
            }
        }
        records.extend(phases.map(skipped));

        self.ctx.runtime().block_on(self.ctx.shutdown());

        RunReport {
            exit_code,
            records,
            plugins: self.ctx.plugins().descriptors(),
            cancel_reason: self.ctx.cancellation().reason(),
        }
    }

    fn run_phase(&self, kind: PhaseKind, ui: &dyn UiShell) -> PhaseOutcome {
        let runtime = self.ctx.runtime();
        match kind {
            PhaseKind::Configure => runtime.block_on(self.guarded(kind, self.configure())),
            PhaseKind::InitCoreServices => {
                runtime.block_on(self.guarded(kind, self.init_core_services()))
            }
            PhaseKind::InitHardware => runtime.block_on(self.guarded(kind, self.init_hardware())),
            PhaseKind::LoadPlugins => runtime.block_on(self.guarded(kind, self.load_plugins())),
            PhaseKind::StartUi => self.start_ui(ui),
        }
    }

    /// Race `work` against cancellation and, for every phase except
    /// InitHardware, the startup deadline.
    async fn guarded<F>(&self, kind: PhaseKind, work: F) -> PhaseOutcome
    where
        F: Future<Output = Result<PhaseOutcome, PhaseError>>,
    {
        let budget = self.startup_budget();
        let deadline = (kind != PhaseKind::InitHardware).then_some(budget);
        let cancellation = self.ctx.cancellation();

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => PhaseOutcome::Cancelled,
            result = within(deadline, catch_panic(work)) => match result {
                Ok(Ok(Ok(outcome))) => outcome,
                Ok(Ok(Err(_))) if cancellation.is_cancelled() => PhaseOutcome::Cancelled,
                Ok(Ok(Err(err))) => on_failure(kind, err),
                Ok(Err(message)) => on_failure(kind, PhaseError::Panicked { phase: kind, message }),
                Err(after) => on_failure(kind, PhaseError::Timeout { phase: kind, after }),
            },
        }
    }

    fn startup_budget(&self) -> Duration {
        self.ctx
            .registry()
            .map(|registry| registry.config().timeouts.startup())
            .unwrap_or_else(|| TimeoutConfig::default().startup())
    }

    fn registry(&self) -> Result<Arc<ServiceRegistry>, PhaseError> {
        self.ctx.registry().ok_or(PhaseError::MissingRegistry)
    }

    async fn configure(&self) -> Result<PhaseOutcome, PhaseError> {
        let config = Arc::new(load_layered(&self.launch.sources)?);

        let provider = Arc::new(ConfigProvider::new(config.clone()));
        provider.initialize(&self.ctx.cancellation().token()).await?;

        if self.launch.init_logging {
            if let Some(guard) = logging::init(&config.logging)? {
                self.ctx.set_log_guard(guard);
            }
        }
        tracing::info!(
            run_id = %self.ctx.run_id(),
            app = %config.app.name,
            environment = %config.app.environment,
            "Configuration loaded"
        );

        let monitor = Arc::new(SystemMonitor::new(&config.monitor, self.ctx.faults().clone()));
        let health = HealthRegistry::new()
            .register(Arc::new(SystemProbe::new(monitor.clone())))
            .register(Arc::new(HardwareProbe::new(
                self.ctx.hardware_status().clone(),
                config.hardware.enabled,
            )))
            .register(Arc::new(PluginsProbe::new(
                self.ctx.plugins().clone(),
                config.plugins.enabled,
            )));

        let mut builder = ServiceRegistryBuilder::new(provider, monitor)
            .core(Arc::new(AppStateTracker::new(config.state.path.clone())))
            .plugin_catalog(self.launch.catalog.clone())
            .health(health);
        for service in &self.launch.core_services {
            builder = builder.core(service.clone());
        }
        if config.hardware.enabled {
            for subsystem in (self.launch.hardware)(&config.hardware) {
                builder = builder.hardware(subsystem);
            }
        }

        self.ctx.install_registry(Arc::new(builder.build()));
        Ok(PhaseOutcome::Success)
    }

    async fn init_core_services(&self) -> Result<PhaseOutcome, PhaseError> {
        let registry = self.registry()?;
        let cancel = self.ctx.cancellation().token();

        for handle in registry.core_services() {
            if cancel.is_cancelled() {
                return Ok(PhaseOutcome::Cancelled);
            }
            handle.service().initialize(cancel.child_token()).await?;
            tracing::info!(service = %handle.name(), "Core service initialized");
        }
        Ok(PhaseOutcome::Success)
    }

    async fn init_hardware(&self) -> Result<PhaseOutcome, PhaseError> {
        let registry = self.registry()?;
        if !registry.config().hardware.enabled {
            tracing::info!("Hardware disabled, skipping initialization");
            return Ok(PhaseOutcome::Success);
        }

        let cancel = self.ctx.cancellation().token();
        let budget = registry.config().timeouts.startup();
        let board = self.ctx.hardware_status();
        let mut degraded = Vec::new();

        for subsystem in registry.hardware() {
            if cancel.is_cancelled() {
                return Ok(PhaseOutcome::Cancelled);
            }
            let name = subsystem.name();
            let status = match timeout(budget, catch_panic(subsystem.initialize(&cancel))).await {
                Ok(Ok(Ok(()))) => SubsystemStatus::Ready,
                Ok(Ok(Err(e))) => SubsystemStatus::Degraded(describe(&e)),
                Ok(Err(panic)) => SubsystemStatus::Degraded(format!("panicked: {panic}")),
                Err(_) => SubsystemStatus::Degraded(format!("timed out after {budget:?}")),
            };

            match &status {
                SubsystemStatus::Ready => {
                    tracing::info!(subsystem = %name, "Hardware subsystem ready");
                }
                SubsystemStatus::Degraded(reason) => {
                    tracing::warn!(subsystem = %name, reason = %reason, "Hardware subsystem degraded");
                    degraded.push(format!("{name}: {reason}"));
                }
            }
            metrics::record_subsystem(name, status == SubsystemStatus::Ready);
            board.record(name, status);
        }

        if degraded.is_empty() {
            Ok(PhaseOutcome::Success)
        } else {
            Ok(PhaseOutcome::Degraded(degraded.join("; ")))
        }
    }

    async fn load_plugins(&self) -> Result<PhaseOutcome, PhaseError> {
        let registry = self.registry()?;
        let config = registry.config();
        if !config.plugins.enabled {
            tracing::info!("Plugins disabled");
            self.ctx.plugins().publish(Vec::new());
            return Ok(PhaseOutcome::Success);
        }

        let discovery = PluginDiscovery::new(config.plugins.clone(), registry.plugin_catalog().clone());
        let loaded = discovery.discover(&self.ctx.cancellation().token()).await?;

        tracing::info!(count = loaded.len(), "Plugins loaded");
        self.ctx.plugins().publish(loaded);
        Ok(PhaseOutcome::Success)
    }

    fn start_ui(&self, ui: &dyn UiShell) -> PhaseOutcome {
        let kind = PhaseKind::StartUi;
        let registry = match self.registry() {
            Ok(registry) => registry,
            Err(err) => return on_failure(kind, err),
        };

        self.ctx
            .set_background(BackgroundServices::start(&self.ctx, &registry));

        let ui_ctx = UiContext {
            title: registry.config().ui.title.clone(),
            plugins: self.ctx.plugins().descriptors(),
            cancel: self.ctx.cancellation().token(),
            health: registry.health().clone(),
            runtime: self.ctx.runtime().clone(),
        };
        drop(registry);

        tracing::info!(shell = %ui.name(), plugins = ui_ctx.plugins.len(), "Presentation layer starting");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _scope = ObservedScope::enter();
            ui.run(ui_ctx)
        }));

        match result {
            Ok(Ok(())) => {
                tracing::info!(shell = %ui.name(), "Presentation layer closed");
                self.ctx.cancellation().request(CancelReason::UiClosed);
                PhaseOutcome::Success
            }
            Ok(Err(err)) => on_failure(kind, err.into()),
            Err(payload) => on_failure(
                kind,
                PhaseError::Panicked {
                    phase: kind,
                    message: panic_message(payload.as_ref()),
                },
            ),
        }
    }
}

/// Await `work`, giving up after `deadline` if one is set.
async fn within<F: Future>(deadline: Option<Duration>, work: F) -> Result<F::Output, Duration> {
    match deadline {
        Some(budget) => timeout(budget, work).await.map_err(|_| budget),
        None => Ok(work.await),
    }
}

fn skipped(kind: PhaseKind) -> PhaseRecord {
    PhaseRecord {
        kind,
        outcome: PhaseOutcome::Skipped,
        elapsed: Duration::ZERO,
    }
}

fn on_failure(kind: PhaseKind, err: PhaseError) -> PhaseOutcome {
    match kind.policy() {
        FailurePolicy::Fatal => PhaseOutcome::Fatal(err),
        FailurePolicy::Degraded => PhaseOutcome::Degraded(describe(&err)),
    }
}

/// `err` and its causes on one line.
fn describe(err: &dyn std::error::Error) -> String {
    std::iter::once(err.to_string())
        .chain(error_chain(err))
        .collect::<Vec<_>>()
        .join(": ")
}

fn log_outcome(kind: PhaseKind, outcome: &PhaseOutcome, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match outcome {
        PhaseOutcome::Success => {
            tracing::info!(phase = %kind, elapsed_ms, "Phase completed");
        }
        PhaseOutcome::Degraded(detail) => {
            tracing::warn!(phase = %kind, elapsed_ms, detail = %detail, "Phase completed degraded");
        }
        PhaseOutcome::Fatal(err) => {
            tracing::error!(phase = %kind, elapsed_ms, error = %describe(err), "Phase failed");
        }
        PhaseOutcome::Cancelled => {
            tracing::info!(phase = %kind, elapsed_ms, "Phase cancelled");
        }
        PhaseOutcome::Skipped => {}
    }
}
