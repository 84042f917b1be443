//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events: console, debug, rotating file)
//!     → metrics.rs (counters, gauges, histograms)
//!     → faults.rs (panic hook + observed detached work)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event
//! - Metrics are cheap (no-op without an exporter)
//! - Fault hooks log; they never restart work

pub mod faults;
pub mod logging;
pub mod metrics;
