//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (orchestrator.rs):
//!     Configure → InitCoreServices → InitHardware → LoadPlugins → StartUi
//!     each phase ends Success / Degraded / Fatal / Cancelled (phase.rs)
//!
//! Cancellation (cancellation.rs):
//!     signal (signals.rs) / background fault / UI closed
//!     → one process-wide token, first reason wins
//!
//! Shutdown (shutdown.rs):
//!     ShutdownGuard → stop services in reverse → stop background
//!     → release registry → flush logs
//! ```
//!
//! # Design Decisions
//! - State moves forward one phase at a time (state.rs)
//! - Hardware failures degrade; every other phase failure is fatal
//! - Teardown runs exactly once however many callers race for it

pub mod background;
pub mod cancellation;
pub mod context;
pub mod orchestrator;
pub mod phase;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use cancellation::{CancelReason, CancellationCoordinator};
pub use context::AppContext;
pub use orchestrator::{Launch, Orchestrator};
pub use phase::{
    FailurePolicy, PhaseError, PhaseKind, PhaseOutcome, PhaseRecord, RunReport, EXIT_FAILURE,
    EXIT_SUCCESS,
};
pub use shutdown::ShutdownGuard;
pub use state::LifecycleState;
