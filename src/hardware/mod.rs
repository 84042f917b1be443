//! Hardware subsystems.
//!
//! # Data Flow
//! ```text
//! Configure:
//!     HardwareProvider(&HardwareConfig) → real drivers or mock substitutes
//!
//! InitHardware:
//!     each subsystem → initialize(cancel)
//!         Ok  → StatusBoard: Ready
//!         Err → StatusBoard: Degraded(reason), logged as warning
//! ```
//!
//! # Design Decisions
//! - Real vs mock is chosen once, at Configure; never swapped later
//! - A failing subsystem degrades only itself
//! - Wire protocols (CAN framing, GPIO lines, PCM streams) live in the drivers'
//!   own crates; this module only brings devices up and down

pub mod drivers;
pub mod mock;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::HardwareConfig;

pub use drivers::{AudioDevice, CanBus, GpioController};
pub use mock::MockSubsystem;

/// Errors raised while bringing a subsystem up or down.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("{subsystem}: device {path} not found")]
    DeviceMissing { subsystem: String, path: PathBuf },

    #[error("{subsystem}: I/O error on {path}")]
    Io {
        subsystem: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{subsystem}: {reason}")]
    Failed { subsystem: String, reason: String },

    #[error("{subsystem}: initialization cancelled")]
    Cancelled { subsystem: String },
}

/// A hardware subsystem the head unit brings up at startup.
#[async_trait]
pub trait HardwareSubsystem: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), HardwareError>;

    async fn stop(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Builds the subsystems for a configuration.
pub type HardwareProvider = Arc<dyn Fn(&HardwareConfig) -> Vec<Arc<dyn HardwareSubsystem>> + Send + Sync>;

/// The default provider: real drivers, or mocks when `use_mock` is set.
pub fn default_provider() -> HardwareProvider {
    Arc::new(select_subsystems)
}

/// Select real or mock subsystems.
pub fn select_subsystems(config: &HardwareConfig) -> Vec<Arc<dyn HardwareSubsystem>> {
    if config.use_mock {
        tracing::info!("Using mock hardware substitutes");
        return vec![
            Arc::new(MockSubsystem::new(drivers::CAN_BUS)),
            Arc::new(MockSubsystem::new(drivers::GPIO)),
            Arc::new(MockSubsystem::new(drivers::AUDIO)),
        ];
    }
    vec![
        Arc::new(CanBus::new(&config.can_interface)),
        Arc::new(GpioController::new(config.gpio_chip.clone())),
        Arc::new(AudioDevice::new(config.audio_device.clone())),
    ]
}

/// Outcome of one subsystem's initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsystemStatus {
    Ready,
    Degraded(String),
}

/// Per-subsystem status, written by InitHardware and read by health probes.
#[derive(Debug, Default)]
pub struct StatusBoard {
    entries: DashMap<String, SubsystemStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, subsystem: &str, status: SubsystemStatus) {
        self.entries.insert(subsystem.to_string(), status);
    }

    pub fn get(&self, subsystem: &str) -> Option<SubsystemStatus> {
        self.entries.get(subsystem).map(|entry| entry.value().clone())
    }

    /// All entries sorted by subsystem name.
    pub fn snapshot(&self) -> Vec<(String, SubsystemStatus)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn degraded_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), SubsystemStatus::Degraded(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
