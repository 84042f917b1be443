//! Plugin discovery and loading.
//!
//! # Data Flow
//! ```text
//! manifests (config + plugins.directory/*.toml)
//!     → discovery.rs (order, dedupe, API version check)
//!     → catalog.rs (entry point → registered factory)
//!     → factory.create(manifest) → plugin.initialize(cancel)
//!     → all succeeded? publish descriptors on the PluginShelf
//! ```
//!
//! # Design Decisions
//! - No dynamic loading: entry points resolve to factories compiled into the host
//! - One failing plugin fails the whole load; nothing is published
//! - The shelf is written once per process

pub mod builtin;
pub mod catalog;
pub mod discovery;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use catalog::{PluginCatalog, PluginFactory};
pub use discovery::PluginDiscovery;

/// Plugin API version implemented by this host.
pub const PLUGIN_API_VERSION: u32 = 1;

/// Error type plugins report.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort plugin loading.
#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("plugin '{plugin}' names unknown entry point '{entry_point}'")]
    UnknownEntryPoint { plugin: String, entry_point: String },

    #[error("plugin '{plugin}' targets API version {found}, host implements {expected}")]
    IncompatibleApi { plugin: String, expected: u32, found: u32 },

    #[error("plugin '{plugin}' is declared more than once")]
    Duplicate { plugin: String },

    #[error("plugin '{plugin}' could not be constructed")]
    Construction {
        plugin: String,
        #[source]
        source: BoxError,
    },

    #[error("plugin '{plugin}' failed to initialize")]
    Initialization {
        plugin: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read plugin manifests from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plugin manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("plugin loading cancelled")]
    Cancelled,
}

/// The identity exposed for a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
}

/// A plugin instance.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }

    /// One-line status for the presentation layer.
    fn summary(&self) -> String;
}

/// A plugin that finished initialization.
#[derive(Clone)]
pub struct LoadedPlugin {
    pub descriptor: PluginDescriptor,
    pub instance: Arc<dyn Plugin>,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Holds the plugins visible to the presentation layer.
#[derive(Debug, Default)]
pub struct PluginShelf {
    loaded: OnceLock<Vec<LoadedPlugin>>,
}

impl PluginShelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the loaded set. Returns false if a set was already published.
    pub fn publish(&self, plugins: Vec<LoadedPlugin>) -> bool {
        self.loaded.set(plugins).is_ok()
    }

    pub fn is_published(&self) -> bool {
        self.loaded.get().is_some()
    }

    pub fn plugins(&self) -> &[LoadedPlugin] {
        self.loaded.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins().iter().map(|p| p.descriptor.clone()).collect()
    }
}
