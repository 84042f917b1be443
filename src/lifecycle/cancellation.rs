//! Process-wide cancellation signal.

use std::fmt;
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

/// Why cancellation was first requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Terminal interrupt (SIGINT/SIGTERM).
    Interrupt,
    /// A fault captured from the background services.
    Fault,
    /// The UI event loop returned.
    UiClosed,
    /// Teardown started.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CancelReason::Interrupt => "interrupt",
            CancelReason::Fault => "fault",
            CancelReason::UiClosed => "ui-closed",
            CancelReason::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Owns the one cancellation signal of the process.
///
/// Cancellation is monotonic: the first request wins and records its reason,
/// later requests are no-ops.
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle on the shared signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation. Returns true only for the request that took effect.
    pub fn request(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        if first {
            tracing::info!(reason = %reason, "Cancellation requested");
        } else {
            tracing::debug!(reason = %reason, "Cancellation already requested");
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason recorded by the first request.
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
