//! Service registry.
//!
//! # Responsibilities
//! - Hold every long-lived service built during Configure
//! - Expose core handles, hardware subsystems, plugin catalog and health probes
//!
//! # Design Decisions
//! - Built through a builder; the registry has no mutation API
//! - Shared as `Arc<ServiceRegistry>`, read-only after Configure

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::hardware::HardwareSubsystem;
use crate::health::HealthRegistry;
use crate::plugins::PluginCatalog;
use crate::services::{ConfigProvider, Service, ServiceError, ServiceHandle, ServiceKind, SystemMonitor};

/// Frozen set of services for one process run.
pub struct ServiceRegistry {
    provider: Arc<ConfigProvider>,
    monitor: Arc<SystemMonitor>,
    handles: Vec<ServiceHandle>,
    hardware: Vec<Arc<dyn HardwareSubsystem>>,
    catalog: Arc<PluginCatalog>,
    health: Arc<HealthRegistry>,
}

impl ServiceRegistry {
    pub fn config(&self) -> &Arc<AppConfig> {
        self.provider.config()
    }

    pub fn config_provider(&self) -> &Arc<ConfigProvider> {
        &self.provider
    }

    pub fn monitor(&self) -> &Arc<SystemMonitor> {
        &self.monitor
    }

    /// Every handle, in registration order.
    pub fn handles(&self) -> &[ServiceHandle] {
        &self.handles
    }

    /// Handles started by InitCoreServices, in registration order.
    pub fn core_services(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.handles.iter().filter(|h| h.kind() == ServiceKind::Core)
    }

    pub fn hardware(&self) -> &[Arc<dyn HardwareSubsystem>] {
        &self.hardware
    }

    pub fn plugin_catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }
}

/// Collects services during Configure.
pub struct ServiceRegistryBuilder {
    provider: Arc<ConfigProvider>,
    monitor: Arc<SystemMonitor>,
    handles: Vec<ServiceHandle>,
    hardware: Vec<Arc<dyn HardwareSubsystem>>,
    catalog: Arc<PluginCatalog>,
    health: Arc<HealthRegistry>,
}

impl ServiceRegistryBuilder {
    /// Start a registry with the config provider and the system monitor,
    /// which is registered as the first core service.
    pub fn new(provider: Arc<ConfigProvider>, monitor: Arc<SystemMonitor>) -> Self {
        let stop_timeout = provider.config().timeouts.service_stop();
        let handles = vec![ServiceHandle::new(ServiceKind::Core, monitor.clone(), stop_timeout)];
        Self {
            provider,
            monitor,
            handles,
            hardware: Vec::new(),
            catalog: Arc::new(PluginCatalog::new()),
            health: Arc::new(HealthRegistry::default()),
        }
    }

    /// Register a core service with the configured stop budget.
    pub fn core(mut self, service: Arc<dyn Service>) -> Self {
        let stop_timeout = self.provider.config().timeouts.service_stop();
        self.handles.push(ServiceHandle::new(ServiceKind::Core, service, stop_timeout));
        self
    }

    /// Register a hardware subsystem; its stop hook joins the handle list.
    pub fn hardware(mut self, subsystem: Arc<dyn HardwareSubsystem>) -> Self {
        let stop_timeout = self.provider.config().timeouts.service_stop();
        let adapter: Arc<dyn Service> = Arc::new(HardwareStopHook(subsystem.clone()));
        self.handles.push(ServiceHandle::new(ServiceKind::Hardware, adapter, stop_timeout));
        self.hardware.push(subsystem);
        self
    }

    pub fn plugin_catalog(mut self, catalog: Arc<PluginCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Arc::new(health);
        self
    }

    pub fn build(self) -> ServiceRegistry {
        tracing::debug!(
            services = self.handles.len(),
            hardware = self.hardware.len(),
            plugin_factories = self.catalog.len(),
            probes = self.health.len(),
            "Service registry built"
        );
        ServiceRegistry {
            provider: self.provider,
            monitor: self.monitor,
            handles: self.handles,
            hardware: self.hardware,
            catalog: self.catalog,
            health: self.health,
        }
    }
}

/// Exposes a hardware subsystem's stop hook as a service handle.
struct HardwareStopHook(Arc<dyn HardwareSubsystem>);

#[async_trait]
impl Service for HardwareStopHook {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.0.stop().await.map_err(|e| ServiceError::Stop {
            service: self.0.name().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MonitorConfig;
    use crate::hardware::mock::MockSubsystem;
    use crate::observability::faults::FaultHandler;
    use crate::services::AppStateTracker;

    #[test]
    fn test_handles_keep_registration_order() {
        let provider = Arc::new(ConfigProvider::new(Arc::new(AppConfig::default())));
        let monitor = Arc::new(SystemMonitor::new(&MonitorConfig::default(), FaultHandler::new()));
        let registry = ServiceRegistryBuilder::new(provider, monitor)
            .core(Arc::new(AppStateTracker::new(None)))
            .hardware(Arc::new(MockSubsystem::new("can-bus")))
            .build();

        let names: Vec<_> = registry.handles().iter().map(|h| h.name().to_string()).collect();
        assert_eq!(names, ["system-monitor", "app-state", "can-bus"]);
        assert_eq!(registry.core_services().count(), 2);
        assert_eq!(registry.hardware().len(), 1);
        assert_eq!(registry.handles()[2].stop_timeout(), std::time::Duration::from_secs(5));
    }
}
