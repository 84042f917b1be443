//! Shell for units without a display.

use crate::ui::{UiContext, UiError, UiShell};

/// Holds the main thread until cancellation is requested, whether by a
/// signal or by a supervised background service failing.
#[derive(Debug, Default)]
pub struct HeadlessShell;

impl HeadlessShell {
    pub fn new() -> Self {
        Self
    }
}

impl UiShell for HeadlessShell {
    fn name(&self) -> &str {
        "headless"
    }

    fn run(&self, ctx: UiContext) -> Result<(), UiError> {
        tracing::info!(title = %ctx.title, plugins = ctx.plugins.len(), "Running headless");
        ctx.runtime.block_on(ctx.cancel.cancelled());
        tracing::info!("Headless shell released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_returns_on_cancel() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let ctx = UiContext {
            title: "Head Unit".into(),
            plugins: Vec::new(),
            cancel,
            health: Arc::new(HealthRegistry::new()),
            runtime: runtime.handle().clone(),
        };
        assert!(HeadlessShell::new().run(ctx).is_ok());
    }
}
