//! Registered plugin factories.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PluginManifest;
use crate::plugins::{builtin, BoxError, Plugin};

/// Builds a plugin instance from its manifest.
pub trait PluginFactory: Send + Sync {
    fn create(&self, manifest: &PluginManifest) -> Result<Arc<dyn Plugin>, BoxError>;
}

impl<F> PluginFactory for F
where
    F: Fn(&PluginManifest) -> Result<Arc<dyn Plugin>, BoxError> + Send + Sync,
{
    fn create(&self, manifest: &PluginManifest) -> Result<Arc<dyn Plugin>, BoxError> {
        self(manifest)
    }
}

/// Entry-point name → factory.
#[derive(Default)]
pub struct PluginCatalog {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
}

impl PluginCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with the built-in plugins registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        builtin::register(&mut catalog);
        catalog
    }

    /// Register `factory` under `entry_point`, replacing any previous one.
    pub fn register(&mut self, entry_point: impl Into<String>, factory: impl PluginFactory + 'static) -> &mut Self {
        let entry_point = entry_point.into();
        if self.factories.insert(entry_point.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(entry_point = %entry_point, "Plugin factory replaced");
        }
        self
    }

    pub fn resolve(&self, entry_point: &str) -> Option<Arc<dyn PluginFactory>> {
        self.factories.get(entry_point).cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let catalog = PluginCatalog::with_builtins();
        assert!(catalog.resolve(builtin::CLOCK).is_some());
        assert!(catalog.resolve(builtin::DIAGNOSTICS).is_some());
        assert!(catalog.resolve("radio").is_none());
    }

    #[test]
    fn test_register_closure() {
        let mut catalog = PluginCatalog::new();
        catalog.register("clock-copy", |manifest: &PluginManifest| -> Result<Arc<dyn Plugin>, BoxError> {
            Ok(Arc::new(builtin::ClockPlugin::new(&manifest.name)))
        });
        assert_eq!(catalog.len(), 1);
    }
}
