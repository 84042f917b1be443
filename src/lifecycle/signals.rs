//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for a termination signal (SIGINT, SIGTERM, SIGQUIT on Unix;
//!   Ctrl-C on Windows)
//! - Translate it into a cancellation request
//!
//! # Design Decisions
//! - Handlers are registered before the listener is spawned, so a signal
//!   that arrives before the task first runs is still caught

use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::cancellation::CancelReason;
use crate::lifecycle::context::AppContext;

/// Registered termination signal streams.
///
/// Must be created inside a runtime context.
#[cfg(unix)]
pub struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Resolves on the next termination signal.
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!("Received SIGINT"),
            _ = self.terminate.recv() => tracing::info!("Received SIGTERM"),
            _ = self.quit.recv() => tracing::info!("Received SIGQUIT"),
        }
    }
}

#[cfg(windows)]
pub struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl ShutdownSignals {
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    pub async fn recv(&mut self) {
        self.ctrl_c.recv().await;
        tracing::info!("Received Ctrl-C");
    }
}

/// Request [`CancelReason::Interrupt`] on the first termination signal.
///
/// Handlers are installed before this returns. The listener exits quietly
/// once cancellation happens for another reason.
pub fn spawn_signal_listener(ctx: Arc<AppContext>) -> io::Result<JoinHandle<()>> {
    let runtime = ctx.runtime().clone();
    let mut signals = {
        let _runtime = runtime.enter();
        ShutdownSignals::register()?
    };

    let faults = ctx.faults().clone();
    Ok(faults.spawn_detached(&runtime, "signal-listener", async move {
        let cancellation = ctx.cancellation();
        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = signals.recv() => {
                cancellation.request(CancelReason::Interrupt);
            }
        }
        Ok::<(), Infallible>(())
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::observability::faults::FaultHandler;

    #[test]
    fn test_interrupt_requests_cancellation() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let ctx = Arc::new(AppContext::new(rt.handle().clone(), FaultHandler::new()));
        let listener = spawn_signal_listener(ctx.clone()).unwrap();

        // Sent before the listener task has necessarily been polled.
        let status = std::process::Command::new("kill")
            .args(["-s", "INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        rt.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), ctx.cancellation().cancelled())
                .await
                .unwrap();
            listener.await.unwrap();
        });
        assert_eq!(ctx.cancellation().reason(), Some(CancelReason::Interrupt));
    }
}
