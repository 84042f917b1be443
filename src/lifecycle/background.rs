//! Ancillary services that run alongside the presentation layer.
//!
//! # Responsibilities
//! - Start the metrics exporter, the health endpoint and the heartbeat
//! - Route their faults through the fault handler and request cancellation
//! - Stop them within a bounded budget during teardown

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::health::{endpoint, HealthRegistry};
use crate::lifecycle::cancellation::CancelReason;
use crate::lifecycle::context::AppContext;
use crate::observability::metrics;
use crate::services::ServiceRegistry;

/// Handles on the running background tasks.
pub struct BackgroundServices {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundServices {
    /// Start every enabled background service on the context's runtime.
    pub fn start(ctx: &AppContext, registry: &ServiceRegistry) -> Self {
        let config = registry.config();
        let cancel = ctx.cancellation().token().child_token();
        let mut tasks = Vec::new();

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse::<SocketAddr>() {
                Ok(addr) => {
                    let _runtime = ctx.runtime().enter();
                    if let Err(metrics::MetricsError::Install { source, .. }) = metrics::install_exporter(addr) {
                        tracing::warn!(address = %addr, error = %source, "Metrics exporter unavailable");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Invalid metrics address"),
            }
        }

        if config.health.endpoint_enabled {
            let bind = config.health.bind_address.clone();
            let health = registry.health().clone();
            let token = cancel.clone();
            tasks.push((
                "health-endpoint",
                Self::supervise(ctx, "health-endpoint", async move {
                    let listener = TcpListener::bind(&bind).await?;
                    endpoint::serve(listener, health, token).await
                }),
            ));
        }

        let heartbeat = Duration::from_secs(config.monitor.heartbeat_secs.max(1));
        tasks.push((
            "heartbeat",
            Self::supervise(
                ctx,
                "heartbeat",
                run_heartbeat(heartbeat, registry.health().clone(), cancel.clone()),
            ),
        ));

        tracing::info!(services = tasks.len(), "Background services started");
        Self { cancel, tasks }
    }

    fn supervise<F, E>(ctx: &AppContext, task: &'static str, work: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let cancellation = ctx.cancellation().clone();
        ctx.faults().spawn_supervised(ctx.runtime(), task, work, move || {
            cancellation.request(CancelReason::Fault);
        })
    }

    /// Signal every task and wait up to `budget` in total; stragglers are aborted.
    /// A budget too large to form a deadline waits without one.
    pub async fn stop(self, budget: Duration) {
        self.cancel.cancel();
        let deadline = time::Instant::now().checked_add(budget);
        for (name, mut handle) in self.tasks {
            let joined = match deadline {
                Some(deadline) => time::timeout_at(deadline, &mut handle).await.is_ok(),
                None => {
                    let _ = (&mut handle).await;
                    true
                }
            };
            if joined {
                tracing::debug!(service = name, "Background service stopped");
            } else {
                handle.abort();
                tracing::warn!(service = name, budget = ?budget, "Background service did not stop in time, aborted");
            }
        }
    }
}

async fn run_heartbeat(
    period: Duration,
    health: Arc<HealthRegistry>,
    cancel: CancellationToken,
) -> Result<(), Infallible> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                let report = health.check_all().await;
                metrics::record_uptime(started.elapsed());
                tracing::info!(
                    status = %report.status,
                    uptime_secs = started.elapsed().as_secs(),
                    "Heartbeat"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            Duration::from_secs(60),
            Arc::new(HealthRegistry::new()),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    fn waiting_on(cancel: &CancellationToken) -> JoinHandle<()> {
        let token = cancel.clone();
        tokio::spawn(async move { token.cancelled().await })
    }

    #[tokio::test]
    async fn test_stop_with_unbounded_budget() {
        let cancel = CancellationToken::new();
        let services = BackgroundServices {
            tasks: vec![("idle", waiting_on(&cancel))],
            cancel,
        };
        tokio::time::timeout(Duration::from_secs(5), services.stop(Duration::MAX))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_stragglers() {
        let cancel = CancellationToken::new();
        let stuck = tokio::spawn(std::future::pending::<()>());
        let abort = stuck.abort_handle();
        let services = BackgroundServices {
            tasks: vec![("idle", waiting_on(&cancel)), ("stuck", stuck)],
            cancel,
        };
        services.stop(Duration::from_secs(2)).await;
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
