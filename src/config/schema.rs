//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the head unit.
//! All types derive Serde traits for deserialization from the merged layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the head-unit host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity.
    pub app: AppSection,

    /// Logging sinks and level.
    pub logging: LoggingConfig,

    /// Hardware subsystem settings.
    pub hardware: HardwareConfig,

    /// Plugin discovery settings.
    pub plugins: PluginsConfig,

    /// Health endpoint settings.
    pub health: HealthConfig,

    /// System monitor settings.
    pub monitor: MonitorConfig,

    /// Metrics exporter settings.
    pub observability: ObservabilityConfig,

    /// Startup and shutdown budgets.
    pub timeouts: TimeoutConfig,

    /// UI settings.
    pub ui: UiConfig,

    /// Persisted application-state location.
    pub state: StateConfig,
}

/// Application identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSection {
    /// Display name used in the banner and logs.
    pub name: String,

    /// Active environment (filled in by the loader).
    pub environment: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "headunit".to_string(),
            environment: "production".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit an additional debug-level sink on stderr.
    pub debug_sink: bool,

    /// Rotating file sink.
    pub file: FileSinkConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug_sink: false,
            file: FileSinkConfig::default(),
        }
    }
}

/// Rotating file sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub enabled: bool,

    /// Directory for log files.
    pub directory: PathBuf,

    /// File name prefix.
    pub prefix: String,

    /// Rotation period.
    pub rotation: Rotation,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("logs"),
            prefix: "headunit.log".to_string(),
            rotation: Rotation::Daily,
        }
    }
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Hourly,
    Daily,
    Never,
}

/// Hardware subsystem configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Initialize hardware at all.
    pub enabled: bool,

    /// Use mock substitutes instead of real drivers. Read once at startup.
    pub use_mock: bool,

    /// CAN network interface name (e.g. "can0").
    pub can_interface: String,

    /// GPIO character device.
    pub gpio_chip: PathBuf,

    /// ALSA device directory.
    pub audio_device: PathBuf,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_mock: false,
            can_interface: "can0".to_string(),
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            audio_device: PathBuf::from("/dev/snd"),
        }
    }
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Discover and initialize plugins at all.
    pub enabled: bool,

    /// Optional directory of `*.toml` manifests.
    pub directory: Option<PathBuf>,

    /// Manifests declared inline.
    pub manifests: Vec<PluginManifest>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            manifests: vec![
                PluginManifest::builtin("Clock", "Dashboard clock", "clock"),
                PluginManifest::builtin("Diagnostics", "Vehicle diagnostics overview", "diagnostics"),
            ],
        }
    }
}

/// Declared plugin identity and entry point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginManifest {
    /// Unique plugin name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Name of the registered factory that builds this plugin.
    pub entry_point: String,

    /// Host plugin API version the plugin was written against.
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Declared capabilities (informational).
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl PluginManifest {
    fn builtin(name: &str, description: &str, entry_point: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            entry_point: entry_point.to_string(),
            api_version: default_api_version(),
            capabilities: Vec::new(),
        }
    }
}

fn default_api_version() -> u32 {
    crate::plugins::PLUGIN_API_VERSION
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Serve `GET /health` from the background services.
    pub endpoint_enabled: bool,

    /// Bind address for the endpoint.
    pub bind_address: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint_enabled: false,
            bind_address: "127.0.0.1:8089".to_string(),
        }
    }
}

/// System monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in seconds.
    pub interval_secs: u64,

    /// Heartbeat log interval in seconds (background services).
    pub heartbeat_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            heartbeat_secs: 60,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Startup and shutdown budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each startup phase in seconds.
    pub startup_secs: u64,

    /// Per-service stop budget in seconds.
    pub service_stop_secs: u64,

    /// Background services stop budget in seconds.
    pub background_stop_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            startup_secs: 30,
            service_stop_secs: 5,
            background_stop_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn service_stop(&self) -> Duration {
        Duration::from_secs(self.service_stop_secs)
    }

    pub fn background_stop(&self) -> Duration {
        Duration::from_secs(self.background_stop_secs)
    }
}

/// UI configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    /// Window title shown by graphical shells.
    pub title: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Head Unit".to_string(),
        }
    }
}

/// Application-state persistence configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file holding run bookkeeping. `None` keeps state in memory only.
    pub path: Option<PathBuf>,
}
