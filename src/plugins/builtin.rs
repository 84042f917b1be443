//! Plugins shipped with the host.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::config::PluginManifest;
use crate::plugins::{BoxError, Plugin, PluginCatalog};

pub const CLOCK: &str = "clock";
pub const DIAGNOSTICS: &str = "diagnostics";

/// Register every built-in factory.
pub fn register(catalog: &mut PluginCatalog) {
    catalog
        .register(CLOCK, |manifest: &PluginManifest| -> Result<Arc<dyn Plugin>, BoxError> {
            Ok(Arc::new(ClockPlugin::new(&manifest.name)))
        })
        .register(DIAGNOSTICS, |_: &PluginManifest| -> Result<Arc<dyn Plugin>, BoxError> {
            Ok(Arc::new(DiagnosticsPlugin::new()))
        });
}

/// Shows UTC wall-clock time.
pub struct ClockPlugin {
    label: String,
}

impl ClockPlugin {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl Plugin for ClockPlugin {
    fn summary(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("{}: {} UTC", self.label, format_time_of_day(secs))
    }
}

fn format_time_of_day(epoch_secs: u64) -> String {
    let day = epoch_secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}

/// Reports how long the host has been up since the plugin loaded.
pub struct DiagnosticsPlugin {
    loaded_at: Instant,
}

impl DiagnosticsPlugin {
    pub fn new() -> Self {
        Self {
            loaded_at: Instant::now(),
        }
    }
}

impl Default for DiagnosticsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for DiagnosticsPlugin {
    fn summary(&self) -> String {
        format!("diagnostics: up {}s", self.loaded_at.elapsed().as_secs())
    }
}
