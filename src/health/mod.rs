//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! HealthRegistry::check_all()
//!     → each HealthProbe (probes.rs) reports Healthy / Degraded / Unhealthy
//!     → worst status wins
//!     → HealthReport (console `health` command, GET /health in endpoint.rs)
//! ```
//!
//! # Design Decisions
//! - Probes read shared state; they never drive initialization
//! - Degraded hardware is not Unhealthy: the unit keeps running

pub mod endpoint;
pub mod probes;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use probes::{HardwareProbe, PluginsProbe, SystemProbe};

/// Health of a single probe or of the whole unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// What one probe observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub status: HealthStatus,
    pub detail: String,
}

impl ProbeResult {
    pub fn healthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            detail: detail.into(),
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: detail.into(),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> ProbeResult;
}

/// Combined result of every registered probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, ProbeResult>,
}

/// The set of probes consulted for a health report.
#[derive(Default)]
pub struct HealthRegistry {
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Run every probe. An empty registry reports Healthy.
    pub async fn check_all(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        let mut status = HealthStatus::Healthy;
        for probe in &self.probes {
            let result = probe.check().await;
            status = status.max(result.status);
            checks.insert(probe.name().to_string(), result);
        }
        HealthReport { status, checks }
    }
}
