//! Process-wide fault hooks.
//!
//! # Responsibilities
//! - Catch panics inside fire-and-forget async work, log them and mark them
//!   acknowledged so they never take the process down
//! - Log every other panic at critical severity before the platform unwinds
//!
//! # Design Decisions
//! - Detached work is wrapped so panics are caught at the poll boundary
//! - A thread-local depth marks "inside observed work" so the panic hook
//!   leaves those panics to the async path
//! - The hook chains to the previously installed hook; termination behavior
//!   is unchanged
//! - Failed work is not retried

use std::any::Any;
use std::cell::Cell;
use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::observability::metrics;

thread_local! {
    static OBSERVED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Fault classes handled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A fault in detached async work nobody awaited.
    UnobservedAsync,
    /// A panic that escaped every other handler.
    ProcessFatal,
}

impl FaultKind {
    fn as_str(self) -> &'static str {
        match self {
            FaultKind::UnobservedAsync => "unobserved-async",
            FaultKind::ProcessFatal => "process-fatal",
        }
    }
}

/// Counts and logs faults.
#[derive(Debug, Default)]
pub struct FaultHandler {
    acknowledged: AtomicU64,
    unhandled: AtomicU64,
}

impl FaultHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install the process panic hook. Only the first call in a process installs.
    pub fn install_panic_hook(self: &Arc<Self>) -> bool {
        if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
            tracing::debug!("Panic hook already installed");
            return false;
        }

        let handler = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if OBSERVED_DEPTH.with(Cell::get) > 0 {
                return;
            }
            handler.unhandled.fetch_add(1, Ordering::SeqCst);
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".to_string());
            tracing::error!(
                severity = "critical",
                fault = FaultKind::ProcessFatal.as_str(),
                thread = thread.name().unwrap_or("<unnamed>"),
                location = %location,
                message = %panic_message(info.payload()),
                "Unhandled fault"
            );
            previous(info);
        }));
        true
    }

    /// Spawn fire-and-forget work whose faults are logged and acknowledged.
    pub fn spawn_detached<F, E>(self: &Arc<Self>, runtime: &Handle, task: impl Into<String>, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.spawn_supervised(runtime, task, work, || {})
    }

    /// Like [`spawn_detached`](Self::spawn_detached), running `on_fault` after
    /// the fault has been acknowledged.
    pub fn spawn_supervised<F, E, H>(
        self: &Arc<Self>,
        runtime: &Handle,
        task: impl Into<String>,
        work: F,
        on_fault: H,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
        H: FnOnce() + Send + 'static,
    {
        let handler = Arc::clone(self);
        let task = task.into();
        runtime.spawn(async move {
            let failure = match catch_panic(work).await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic,
            };
            handler.acknowledge(&task, &failure);
            on_fault();
        })
    }

    /// Log an unobserved async fault and mark it handled.
    pub fn acknowledge(&self, task: &str, failure: &str) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        metrics::record_acknowledged_fault();
        tracing::error!(
            fault = FaultKind::UnobservedAsync.as_str(),
            task = %task,
            error = %failure,
            "Unobserved async fault acknowledged"
        );
    }

    pub fn acknowledged_faults(&self) -> u64 {
        self.acknowledged.load(Ordering::SeqCst)
    }

    pub fn unhandled_faults(&self) -> u64 {
        self.unhandled.load(Ordering::SeqCst)
    }
}

/// Drive `future`, turning a panic into `Err(message)`.
pub fn catch_panic<F: Future>(future: F) -> CatchPanic<F> {
    CatchPanic {
        inner: Box::pin(future),
    }
}

/// Future returned by [`catch_panic`].
pub struct CatchPanic<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _scope = ObservedScope::enter();
        let inner = self.inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(move || inner.poll(cx))) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(panic_message(payload.as_ref()))),
        }
    }
}

/// Marks the current thread as running observed work.
pub(crate) struct ObservedScope;

impl ObservedScope {
    pub(crate) fn enter() -> Self {
        OBSERVED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        ObservedScope
    }
}

impl Drop for ObservedScope {
    fn drop(&mut self) {
        OBSERVED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_catch_panic_returns_message() {
        let result: Result<(), String> = catch_panic(async {
            tokio::task::yield_now().await;
            panic!("bus exploded");
        })
        .await;
        assert_eq!(result.unwrap_err(), "bus exploded");
    }

    #[tokio::test]
    async fn test_catch_panic_passes_output() {
        assert_eq!(catch_panic(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_detached_panic_is_acknowledged() {
        let handler = FaultHandler::new();
        let handle = handler.spawn_detached(&Handle::current(), "probe", async {
            if should_panic() {
                panic!("probe failed");
            }
            Ok::<(), String>(())
        });

        handle.await.expect("wrapper task never panics");
        assert_eq!(handler.acknowledged_faults(), 1);
        assert_eq!(handler.unhandled_faults(), 0);
    }

    fn should_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_detached_error_runs_fault_callback() {
        let handler = FaultHandler::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        handler.spawn_supervised(
            &Handle::current(),
            "timer",
            async { Err::<(), _>("timer stalled") },
            move || {
                let _ = tx.send(());
            },
        );

        tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(handler.acknowledged_faults(), 1);
    }

    #[tokio::test]
    async fn test_successful_work_is_not_a_fault() {
        let handler = FaultHandler::new();
        handler
            .spawn_detached(&Handle::current(), "noop", async { Ok::<(), String>(()) })
            .await
            .unwrap();
        assert_eq!(handler.acknowledged_faults(), 0);
    }

    #[test]
    fn test_observed_scope_nests() {
        let outer = ObservedScope::enter();
        let inner = ObservedScope::enter();
        assert_eq!(OBSERVED_DEPTH.with(Cell::get), 2);
        drop(inner);
        drop(outer);
        assert_eq!(OBSERVED_DEPTH.with(Cell::get), 0);
    }
}
