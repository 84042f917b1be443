//! Manifest discovery and plugin construction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{PluginManifest, PluginsConfig};
use crate::plugins::{
    LoadedPlugin, PluginCatalog, PluginDescriptor, PluginLoadError, PLUGIN_API_VERSION,
};

/// Finds plugin manifests and builds every plugin they declare.
pub struct PluginDiscovery {
    config: PluginsConfig,
    catalog: Arc<PluginCatalog>,
}

impl PluginDiscovery {
    pub fn new(config: PluginsConfig, catalog: Arc<PluginCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Load every declared plugin, in declaration order.
    ///
    /// Inline manifests come first, then directory manifests sorted by file
    /// name. Returns an error on the first failure; plugins built before it
    /// are dropped.
    pub async fn discover(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<LoadedPlugin>, PluginLoadError> {
        let manifests = self.manifests().await?;
        tracing::info!(count = manifests.len(), "Plugin manifests discovered");

        let mut seen = HashSet::new();
        for manifest in &manifests {
            if !seen.insert(manifest.name.as_str()) {
                return Err(PluginLoadError::Duplicate {
                    plugin: manifest.name.clone(),
                });
            }
        }

        let mut loaded = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            if cancel.is_cancelled() {
                return Err(PluginLoadError::Cancelled);
            }
            loaded.push(self.load(manifest, cancel).await?);
        }
        Ok(loaded)
    }

    async fn load(
        &self,
        manifest: PluginManifest,
        cancel: &CancellationToken,
    ) -> Result<LoadedPlugin, PluginLoadError> {
        if manifest.api_version != PLUGIN_API_VERSION {
            return Err(PluginLoadError::IncompatibleApi {
                plugin: manifest.name,
                expected: PLUGIN_API_VERSION,
                found: manifest.api_version,
            });
        }

        let factory = self.catalog.resolve(&manifest.entry_point).ok_or_else(|| {
            PluginLoadError::UnknownEntryPoint {
                plugin: manifest.name.clone(),
                entry_point: manifest.entry_point.clone(),
            }
        })?;

        let instance = factory
            .create(&manifest)
            .map_err(|source| PluginLoadError::Construction {
                plugin: manifest.name.clone(),
                source,
            })?;

        tokio::select! {
            _ = cancel.cancelled() => return Err(PluginLoadError::Cancelled),
            result = instance.initialize(cancel) => {
                result.map_err(|source| PluginLoadError::Initialization {
                    plugin: manifest.name.clone(),
                    source,
                })?;
            }
        }

        tracing::info!(
            plugin = %manifest.name,
            entry_point = %manifest.entry_point,
            capabilities = ?manifest.capabilities,
            "Plugin loaded"
        );

        Ok(LoadedPlugin {
            descriptor: PluginDescriptor {
                name: manifest.name,
                description: manifest.description,
            },
            instance,
        })
    }

    async fn manifests(&self) -> Result<Vec<PluginManifest>, PluginLoadError> {
        let mut manifests = self.config.manifests.clone();
        if let Some(dir) = &self.config.directory {
            manifests.extend(read_directory(dir).await?);
        }
        Ok(manifests)
    }
}

async fn read_directory(dir: &Path) -> Result<Vec<PluginManifest>, PluginLoadError> {
    let io_err = |source| PluginLoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PluginLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let manifest: PluginManifest = toml::from_str(&text)
            .map_err(|source| PluginLoadError::Manifest { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), plugin = %manifest.name, "Read plugin manifest");
        manifests.push(manifest);
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{BoxError, Plugin};
    use async_trait::async_trait;

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), BoxError> {
            Err("sensor feed unavailable".into())
        }

        fn summary(&self) -> String {
            "broken".into()
        }
    }

    fn manifest(name: &str, entry_point: &str) -> PluginManifest {
        PluginManifest {
            name: name.into(),
            description: format!("{name} plugin"),
            entry_point: entry_point.into(),
            api_version: PLUGIN_API_VERSION,
            capabilities: Vec::new(),
        }
    }

    fn config(manifests: Vec<PluginManifest>) -> PluginsConfig {
        PluginsConfig {
            enabled: true,
            directory: None,
            manifests,
        }
    }

    #[tokio::test]
    async fn test_loads_in_declaration_order() {
        let discovery = PluginDiscovery::new(
            config(vec![manifest("B", "clock"), manifest("A", "diagnostics")]),
            Arc::new(PluginCatalog::with_builtins()),
        );
        let loaded = discovery.discover(&CancellationToken::new()).await.unwrap();
        let names: Vec<_> = loaded.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(loaded[0].descriptor.description, "B plugin");
    }

    #[tokio::test]
    async fn test_unknown_entry_point() {
        let discovery = PluginDiscovery::new(
            config(vec![manifest("Radio", "radio")]),
            Arc::new(PluginCatalog::with_builtins()),
        );
        let err = discovery.discover(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PluginLoadError::UnknownEntryPoint { .. }));
    }

    #[tokio::test]
    async fn test_incompatible_api_version() {
        let mut old = manifest("Old", "clock");
        old.api_version = PLUGIN_API_VERSION + 1;
        let discovery = PluginDiscovery::new(
            config(vec![old]),
            Arc::new(PluginCatalog::with_builtins()),
        );
        let err = discovery.discover(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PluginLoadError::IncompatibleApi { found, .. } if found == PLUGIN_API_VERSION + 1));
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let discovery = PluginDiscovery::new(
            config(vec![manifest("Clock", "clock"), manifest("Clock", "diagnostics")]),
            Arc::new(PluginCatalog::with_builtins()),
        );
        let err = discovery.discover(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PluginLoadError::Duplicate { plugin } if plugin == "Clock"));
    }

    #[tokio::test]
    async fn test_initialization_failure() {
        let mut catalog = PluginCatalog::with_builtins();
        catalog.register("broken", |_: &PluginManifest| -> Result<Arc<dyn Plugin>, BoxError> {
            Ok(Arc::new(Broken))
        });
        let discovery = PluginDiscovery::new(
            config(vec![manifest("Clock", "clock"), manifest("Sensors", "broken")]),
            Arc::new(catalog),
        );
        let err = discovery.discover(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PluginLoadError::Initialization { ref plugin, .. } if plugin == "Sensors"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_directory_manifests_sorted_after_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("20-diag.toml"),
            "name = \"Diag\"\nentry_point = \"diagnostics\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("10-clock.toml"),
            "name = \"Second Clock\"\nentry_point = \"clock\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut cfg = config(vec![manifest("Clock", "clock")]);
        cfg.directory = Some(dir.path().to_path_buf());
        let discovery = PluginDiscovery::new(cfg, Arc::new(PluginCatalog::with_builtins()));

        let loaded = discovery.discover(&CancellationToken::new()).await.unwrap();
        let names: Vec<_> = loaded.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, ["Clock", "Second Clock", "Diag"]);
    }

    #[tokio::test]
    async fn test_malformed_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.toml"), "name = ").unwrap();
        let mut cfg = config(Vec::new());
        cfg.directory = Some(dir.path().to_path_buf());
        let discovery = PluginDiscovery::new(cfg, Arc::new(PluginCatalog::with_builtins()));

        let err = discovery.discover(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PluginLoadError::Manifest { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_load() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let discovery = PluginDiscovery::new(
            config(vec![manifest("Clock", "clock")]),
            Arc::new(PluginCatalog::with_builtins()),
        );
        assert!(matches!(
            discovery.discover(&cancel).await,
            Err(PluginLoadError::Cancelled)
        ));
    }
}
