//! Built-in health probes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::hardware::{StatusBoard, SubsystemStatus};
use crate::health::{HealthProbe, ProbeResult};
use crate::plugins::PluginShelf;
use crate::services::SystemMonitor;

/// Reports on the system monitor's sampling loop.
pub struct SystemProbe {
    monitor: Arc<SystemMonitor>,
}

impl SystemProbe {
    pub fn new(monitor: Arc<SystemMonitor>) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl HealthProbe for SystemProbe {
    fn name(&self) -> &str {
        "system"
    }

    async fn check(&self) -> ProbeResult {
        if !self.monitor.is_running() {
            return ProbeResult::unhealthy("system monitor not running");
        }
        match self.monitor.latest() {
            Some(sample) => {
                let load = sample
                    .load_average
                    .map(|l| format!("{l:.2}"))
                    .unwrap_or_else(|| "n/a".to_string());
                ProbeResult::healthy(format!(
                    "uptime {}s, load {load}",
                    sample.uptime.as_secs()
                ))
            }
            None => ProbeResult::healthy("awaiting first sample"),
        }
    }
}

/// Reports the hardware status board.
pub struct HardwareProbe {
    board: Arc<StatusBoard>,
    enabled: bool,
}

impl HardwareProbe {
    pub fn new(board: Arc<StatusBoard>, enabled: bool) -> Self {
        Self { board, enabled }
    }
}

#[async_trait]
impl HealthProbe for HardwareProbe {
    fn name(&self) -> &str {
        "hardware"
    }

    async fn check(&self) -> ProbeResult {
        if !self.enabled {
            return ProbeResult::healthy("hardware disabled");
        }
        if self.board.is_empty() {
            return ProbeResult::degraded("hardware not initialized");
        }

        let degraded: Vec<String> = self
            .board
            .snapshot()
            .into_iter()
            .filter_map(|(name, status)| match status {
                SubsystemStatus::Ready => None,
                SubsystemStatus::Degraded(reason) => Some(format!("{name}: {reason}")),
            })
            .collect();

        if degraded.is_empty() {
            ProbeResult::healthy("all subsystems ready")
        } else {
            ProbeResult::degraded(degraded.join("; "))
        }
    }
}

/// Reports whether plugins were published.
pub struct PluginsProbe {
    shelf: Arc<PluginShelf>,
    enabled: bool,
}

impl PluginsProbe {
    pub fn new(shelf: Arc<PluginShelf>, enabled: bool) -> Self {
        Self { shelf, enabled }
    }
}

#[async_trait]
impl HealthProbe for PluginsProbe {
    fn name(&self) -> &str {
        "plugins"
    }

    async fn check(&self) -> ProbeResult {
        if !self.enabled {
            return ProbeResult::healthy("plugins disabled");
        }
        if !self.shelf.is_published() {
            return ProbeResult::unhealthy("plugins not loaded");
        }
        ProbeResult::healthy(format!("{} loaded", self.shelf.plugins().len()))
    }
}
