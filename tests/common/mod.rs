//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use headunit_host::config::{ConfigSources, HardwareConfig, PluginManifest};
use headunit_host::hardware::{HardwareError, HardwareProvider, HardwareSubsystem};
use headunit_host::lifecycle::{CancelReason, CancellationCoordinator};
use headunit_host::plugins::{BoxError, Plugin, PluginCatalog, PluginDescriptor};
use headunit_host::services::{Service, ServiceError};
use headunit_host::ui::{UiContext, UiError, UiShell};
use headunit_host::{FaultHandler, Launch, Orchestrator};

/// Ordered record of everything the fixtures observed.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event '{event}' not recorded: {:?}", self.events()))
    }
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Config sources that read only `dir`, plus `overrides`.
pub fn sources(dir: &Path, overrides: &[&str]) -> ConfigSources {
    overrides
        .iter()
        .fold(ConfigSources::isolated(dir), |sources, o| sources.with_override(*o))
}

/// A launch with logging off, test plugins registered and recording hardware.
pub fn launch(sources: ConfigSources, log: &EventLog, hardware: &[(&'static str, HwBehavior)]) -> Launch {
    Launch::new(sources)
        .without_logging()
        .with_catalog(plugin_catalog(log))
        .with_hardware(hardware_provider(log, hardware))
}

pub fn orchestrator(
    runtime: &tokio::runtime::Runtime,
    faults: Arc<FaultHandler>,
    launch: Launch,
) -> Orchestrator {
    Orchestrator::new(runtime.handle().clone(), faults, launch)
}

/// Write `headunit.toml` with the given contents.
pub fn write_config(dir: &Path, contents: &str) {
    std::fs::write(dir.join("headunit.toml"), contents).unwrap();
}

// ---------------------------------------------------------------------------
// Hardware
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub enum HwBehavior {
    Ok,
    Fail,
    /// Ignores cancellation and never finishes.
    Hang,
}

pub struct RecordingHardware {
    name: &'static str,
    behavior: HwBehavior,
    log: EventLog,
}

#[async_trait]
impl HardwareSubsystem for RecordingHardware {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), HardwareError> {
        self.log.push(format!("hardware:init:{}", self.name));
        match self.behavior {
            HwBehavior::Ok => Ok(()),
            HwBehavior::Fail => Err(HardwareError::Failed {
                subsystem: self.name.to_string(),
                reason: "device not responding".into(),
            }),
            HwBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn stop(&self) -> Result<(), HardwareError> {
        self.log.push(format!("hardware:stop:{}", self.name));
        Ok(())
    }
}

pub fn hardware_provider(log: &EventLog, specs: &[(&'static str, HwBehavior)]) -> HardwareProvider {
    let log = log.clone();
    let specs = specs.to_vec();
    Arc::new(move |_: &HardwareConfig| {
        specs
            .iter()
            .map(|(name, behavior)| {
                Arc::new(RecordingHardware {
                    name: *name,
                    behavior: *behavior,
                    log: log.clone(),
                }) as Arc<dyn HardwareSubsystem>
            })
            .collect::<Vec<_>>()
    })
}

// ---------------------------------------------------------------------------
// Core services
// ---------------------------------------------------------------------------

pub struct RecordingService {
    name: &'static str,
    log: EventLog,
    fail: bool,
    cancel_on_init: OnceLock<Arc<CancellationCoordinator>>,
}

impl RecordingService {
    pub fn new(name: &'static str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            fail: false,
            cancel_on_init: OnceLock::new(),
        })
    }

    pub fn failing(name: &'static str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            fail: true,
            cancel_on_init: OnceLock::new(),
        })
    }

    /// Request an interrupt through `coordinator` during initialization.
    pub fn cancel_during_init(&self, coordinator: Arc<CancellationCoordinator>) {
        let _ = self.cancel_on_init.set(coordinator);
    }
}

#[async_trait]
impl Service for RecordingService {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&self, _cancel: CancellationToken) -> Result<(), ServiceError> {
        self.log.push(format!("core:init:{}", self.name));
        if let Some(coordinator) = self.cancel_on_init.get() {
            coordinator.request(CancelReason::Interrupt);
        }
        if self.fail {
            return Err(ServiceError::Start {
                service: self.name.to_string(),
                reason: "backing store unavailable".into(),
            });
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.log.push(format!("core:stop:{}", self.name));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

struct RecordingPlugin {
    name: String,
    fail: bool,
}

#[async_trait]
impl Plugin for RecordingPlugin {
    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), BoxError> {
        if self.fail {
            return Err(format!("{} could not reach its data source", self.name).into());
        }
        Ok(())
    }

    fn summary(&self) -> String {
        self.name.clone()
    }
}

/// Built-ins plus `recording` (always loads) and `failing` (fails to initialize).
pub fn plugin_catalog(log: &EventLog) -> PluginCatalog {
    let mut catalog = PluginCatalog::with_builtins();
    for (entry_point, fail) in [("recording", false), ("failing", true)] {
        let log = log.clone();
        catalog.register(entry_point, move |manifest: &PluginManifest| -> Result<Arc<dyn Plugin>, BoxError> {
            log.push(format!("plugin:create:{}", manifest.name));
            Ok(Arc::new(RecordingPlugin {
                name: manifest.name.clone(),
                fail,
            }))
        });
    }
    catalog
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

type Script = Box<dyn Fn(&UiContext) -> Result<(), UiError> + Send + Sync>;

/// A shell that records its start and then runs a script.
pub struct ScriptedUi {
    log: EventLog,
    plugins: Mutex<Option<Vec<PluginDescriptor>>>,
    script: Script,
}

impl ScriptedUi {
    pub fn new(
        log: &EventLog,
        script: impl Fn(&UiContext) -> Result<(), UiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log: log.clone(),
            plugins: Mutex::new(None),
            script: Box::new(script),
        }
    }

    /// Closes as soon as it opens.
    pub fn closing(log: &EventLog) -> Self {
        Self::new(log, |_| Ok(()))
    }

    /// Plugins the shell was given, if it ran.
    pub fn plugins_seen(&self) -> Option<Vec<PluginDescriptor>> {
        self.plugins.lock().unwrap().clone()
    }
}

impl UiShell for ScriptedUi {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run(&self, ctx: UiContext) -> Result<(), UiError> {
        self.log.push("ui:run");
        *self.plugins.lock().unwrap() = Some(ctx.plugins.clone());
        let result = (self.script)(&ctx);
        self.log.push("ui:closed");
        result
    }
}

/// Three plugin manifests, the middle one failing.
pub const THREE_PLUGINS_ONE_FAILING: &str = r#"
[[plugins.manifests]]
name = "Navigation"
entry_point = "recording"

[[plugins.manifests]]
name = "Telemetry"
entry_point = "failing"

[[plugins.manifests]]
name = "Media"
entry_point = "recording"
"#;
