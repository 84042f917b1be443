//! System monitor.
//!
//! # Responsibilities
//! - Periodically sample uptime and load average
//! - Expose the latest sample to health probes
//!
//! # Design Decisions
//! - Sampling loop runs under a child of the shared cancellation token and
//!   is spawned through the fault handler, so a panicking sample is
//!   acknowledged instead of reaching the panic hook
//! - Load average is best effort (`/proc/loadavg`, Linux only)
//! - Stop failures are reported, never fatal

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::schema::MonitorConfig;
use crate::observability::faults::FaultHandler;
use crate::observability::metrics;
use crate::services::{Service, ServiceError};

const NAME: &str = "system-monitor";
const LOADAVG_PATH: &str = "/proc/loadavg";

/// One monitor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSample {
    pub uptime: Duration,
    pub load_average: Option<f64>,
    pub samples_taken: u64,
}

struct Sampler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

type SampleObserver = Arc<dyn Fn(&MonitorSample) + Send + Sync>;

/// Samples basic system health while the head unit runs.
pub struct SystemMonitor {
    interval: Duration,
    faults: Arc<FaultHandler>,
    observer: Option<SampleObserver>,
    latest: Arc<Mutex<Option<MonitorSample>>>,
    sampler: Mutex<Option<Sampler>>,
}

impl SystemMonitor {
    pub fn new(config: &MonitorConfig, faults: Arc<FaultHandler>) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            faults,
            observer: None,
            latest: Default::default(),
            sampler: Mutex::new(None),
        }
    }

    /// Call `observer` with every sample, on the sampling task.
    pub fn on_sample(mut self, observer: impl Fn(&MonitorSample) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// The most recent sample, if the loop has produced one.
    pub fn latest(&self) -> Option<MonitorSample> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl Service for SystemMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let mut slot = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(ServiceError::Start {
                service: NAME.to_string(),
                reason: "already running".to_string(),
            });
        }

        let child = cancel.child_token();
        let loop_token = child.clone();
        let latest = self.latest.clone();
        let interval = self.interval;
        let observer = self.observer.clone();
        let task = self.faults.spawn_detached(&Handle::current(), NAME, async move {
            let started = Instant::now();
            let mut ticker = time::interval(interval);
            let mut taken = 0u64;
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        taken += 1;
                        let sample = MonitorSample {
                            uptime: started.elapsed(),
                            load_average: read_load_average().await,
                            samples_taken: taken,
                        };
                        metrics::record_uptime(sample.uptime);
                        if let Some(observer) = &observer {
                            observer(&sample);
                        }
                        tracing::trace!(uptime = ?sample.uptime, load = ?sample.load_average, "Monitor sample");
                        *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(sample);
                    }
                }
            }
            tracing::debug!(samples = taken, "System monitor loop exited");
            Ok::<(), Infallible>(())
        });

        *slot = Some(Sampler { cancel: child, task });
        tracing::info!(interval = ?interval, "System monitor started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        let sampler = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sampler) = sampler else {
            return Ok(());
        };

        sampler.cancel.cancel();
        sampler.task.await.map_err(|e| ServiceError::Stop {
            service: NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

async fn read_load_average() -> Option<f64> {
    let content = tokio::fs::read_to_string(LOADAVG_PATH).await.ok()?;
    parse_load_average(&content)
}

fn parse_load_average(content: &str) -> Option<f64> {
    content.split_whitespace().next()?.parse().ok()
}
