//! Presentation layer.
//!
//! # Responsibilities
//! - Define the [`UiShell`] seam the orchestrator hands control to
//! - Provide the interactive console shell and the headless shell
//!
//! # Design Decisions
//! - `run` blocks the calling thread until the shell closes
//! - Shells watch the cancellation token and return on their own; the
//!   orchestrator never force-closes them
//! - A supervised background service that fails (the health endpoint
//!   unable to bind, for example) requests cancellation too. Shells return
//!   when the token fires, so such a fault ends the session through teardown

pub mod console;
pub mod headless;

use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::health::HealthRegistry;
use crate::plugins::PluginDescriptor;

pub use console::ConsoleShell;
pub use headless::HeadlessShell;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("console I/O failed")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Everything a shell gets when it starts.
#[derive(Clone)]
pub struct UiContext {
    pub title: String,
    /// Loaded plugins, in load order.
    pub plugins: Vec<PluginDescriptor>,
    pub cancel: CancellationToken,
    pub health: Arc<HealthRegistry>,
    /// Runtime for async work issued from the UI thread.
    pub runtime: Handle,
}

/// The top-level presentation loop.
pub trait UiShell: Send + Sync {
    fn name(&self) -> &str;

    /// Run until the user closes the shell or cancellation is requested.
    fn run(&self, ctx: UiContext) -> Result<(), UiError>;
}
