//! Long-lived services and their registry.
//!
//! # Data Flow
//! ```text
//! Configure:
//!     ServiceRegistryBuilder ← config provider, core services, hardware,
//!                               plugin catalog, health registry
//!     → build() → ServiceRegistry (frozen)
//!
//! InitCoreServices:
//!     core handles → initialize(cancel)
//!
//! Teardown:
//!     all handles (reverse order) → stop() bounded by stop_timeout
//! ```

pub mod app_state;
pub mod config_provider;
pub mod monitor;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use app_state::AppStateTracker;
pub use config_provider::ConfigProvider;
pub use monitor::SystemMonitor;
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};

/// Errors raised by core services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} failed to start: {reason}")]
    Start { service: String, reason: String },

    #[error("{service} failed to stop: {reason}")]
    Stop { service: String, reason: String },

    #[error("{service} I/O error")]
    Io {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{service} was cancelled")]
    Cancelled { service: String },
}

/// A service with optional start and stop hooks.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self, _cancel: CancellationToken) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// What a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Started by InitCoreServices.
    Core,
    /// Initialized by InitHardware; the handle only carries its stop hook.
    Hardware,
}

/// A registered service and its stop budget.
#[derive(Clone)]
pub struct ServiceHandle {
    name: String,
    kind: ServiceKind,
    service: Arc<dyn Service>,
    stop_timeout: Duration,
}

impl ServiceHandle {
    pub fn new(kind: ServiceKind, service: Arc<dyn Service>, stop_timeout: Duration) -> Self {
        Self {
            name: service.name().to_string(),
            kind,
            service,
            stop_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("stop_timeout", &self.stop_timeout)
            .finish()
    }
}
