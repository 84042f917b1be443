//! Metrics collection and exposition.
//!
//! # Metrics
//! - `headunit_phase_duration_seconds` (histogram): phase latency by phase and outcome
//! - `headunit_hardware_ready` (gauge): 1=ready, 0=degraded, per subsystem
//! - `headunit_faults_acknowledged_total` (counter): unobserved async faults
//! - `headunit_uptime_seconds` (gauge): sampled by the system monitor
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - The exporter is ancillary; failing to install it is never fatal

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;

/// Record how long a phase took and how it ended.
pub fn record_phase(phase: &'static str, outcome: &'static str, elapsed: Duration) {
    histogram!(
        "headunit_phase_duration_seconds",
        "phase" => phase,
        "outcome" => outcome
    )
    .record(elapsed.as_secs_f64());
}

/// Record hardware subsystem readiness.
pub fn record_subsystem(subsystem: &str, ready: bool) {
    gauge!("headunit_hardware_ready", "subsystem" => subsystem.to_string())
        .set(if ready { 1.0 } else { 0.0 });
}

pub fn record_acknowledged_fault() {
    counter!("headunit_faults_acknowledged_total").increment(1);
}

pub fn record_uptime(uptime: Duration) {
    gauge!("headunit_uptime_seconds").set(uptime.as_secs_f64());
}

/// Errors from exporter setup.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus exporter on {addr}")]
    Install {
        addr: SocketAddr,
        #[source]
        source: BuildError,
    },
}

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|source| MetricsError::Install { addr, source })?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
