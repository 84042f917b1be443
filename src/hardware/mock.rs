//! Mock hardware substitutes.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::hardware::{HardwareError, HardwareSubsystem};

/// Stands in for a real subsystem; always comes up.
#[derive(Debug)]
pub struct MockSubsystem {
    name: String,
    running: AtomicBool,
}

impl MockSubsystem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareSubsystem for MockSubsystem {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), HardwareError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!(subsystem = %self.name, "Mock subsystem initialized");
        Ok(())
    }

    async fn stop(&self) -> Result<(), HardwareError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
