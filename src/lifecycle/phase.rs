//! Startup phases, their failure policies and recorded outcomes.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::cancellation::CancelReason;
use crate::lifecycle::state::LifecycleState;
use crate::observability::logging::LoggingError;
use crate::plugins::{PluginDescriptor, PluginLoadError};
use crate::services::ServiceError;
use crate::ui::UiError;

/// Process exit code for a clean run or a cancellation.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code after a fatal startup or UI failure.
pub const EXIT_FAILURE: i32 = -1;

/// The ordered startup phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Configure,
    InitCoreServices,
    InitHardware,
    LoadPlugins,
    StartUi,
}

/// What a failure in a phase does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort startup and exit with [`EXIT_FAILURE`].
    Fatal,
    /// Record the failure and keep going.
    Degraded,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 5] = [
        PhaseKind::Configure,
        PhaseKind::InitCoreServices,
        PhaseKind::InitHardware,
        PhaseKind::LoadPlugins,
        PhaseKind::StartUi,
    ];

    pub fn policy(self) -> FailurePolicy {
        match self {
            PhaseKind::InitHardware => FailurePolicy::Degraded,
            _ => FailurePolicy::Fatal,
        }
    }

    /// The lifecycle state held while this phase runs.
    pub fn state(self) -> LifecycleState {
        match self {
            PhaseKind::Configure => LifecycleState::Configuring,
            PhaseKind::InitCoreServices => LifecycleState::InitializingCore,
            PhaseKind::InitHardware => LifecycleState::InitializingHardware,
            PhaseKind::LoadPlugins => LifecycleState::LoadingPlugins,
            PhaseKind::StartUi => LifecycleState::RunningUi,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Configure => "configure",
            PhaseKind::InitCoreServices => "init-core-services",
            PhaseKind::InitHardware => "init-hardware",
            PhaseKind::LoadPlugins => "load-plugins",
            PhaseKind::StartUi => "start-ui",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a phase failed.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("configuration failed")]
    Configuration(#[from] ConfigError),

    #[error("logging setup failed")]
    Logging(#[from] LoggingError),

    #[error("core service failed")]
    CoreService(#[from] ServiceError),

    #[error("plugin loading failed")]
    PluginLoad(#[from] PluginLoadError),

    #[error("presentation layer failed")]
    Ui(#[from] UiError),

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: PhaseKind, after: Duration },

    #[error("{phase} panicked: {message}")]
    Panicked { phase: PhaseKind, message: String },

    #[error("service registry unavailable")]
    MissingRegistry,
}

/// How one phase ended.
#[derive(Debug)]
pub enum PhaseOutcome {
    Success,
    /// Completed with non-fatal failures.
    Degraded(String),
    Fatal(PhaseError),
    /// Cancellation was observed while the phase ran.
    Cancelled,
    /// Never started: cancellation or an earlier fatal failure.
    Skipped,
}

impl PhaseOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseOutcome::Success => "success",
            PhaseOutcome::Degraded(_) => "degraded",
            PhaseOutcome::Fatal(_) => "fatal",
            PhaseOutcome::Cancelled => "cancelled",
            PhaseOutcome::Skipped => "skipped",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PhaseOutcome::Fatal(_))
    }
}

#[derive(Debug)]
pub struct PhaseRecord {
    pub kind: PhaseKind,
    pub outcome: PhaseOutcome,
    pub elapsed: Duration,
}

/// Everything the host reports once the run is over.
#[derive(Debug)]
pub struct RunReport {
    pub exit_code: i32,
    /// One record per phase, in phase order.
    pub records: Vec<PhaseRecord>,
    /// Plugins that were exposed to the presentation layer.
    pub plugins: Vec<PluginDescriptor>,
    pub cancel_reason: Option<CancelReason>,
}

impl RunReport {
    pub fn outcome(&self, kind: PhaseKind) -> Option<&PhaseOutcome> {
        self.records
            .iter()
            .find(|record| record.kind == kind)
            .map(|record| &record.outcome)
    }

    /// The first fatal failure, if any.
    pub fn fatal(&self) -> Option<(PhaseKind, &PhaseError)> {
        self.records.iter().find_map(|record| match &record.outcome {
            PhaseOutcome::Fatal(err) => Some((record.kind, err)),
            _ => None,
        })
    }

    /// Phases that actually started, in order.
    pub fn phases_run(&self) -> Vec<PhaseKind> {
        self.records
            .iter()
            .filter(|record| !matches!(record.outcome, PhaseOutcome::Skipped))
            .map(|record| record.kind)
            .collect()
    }

    /// Human-readable diagnostic for the fatal failure, cause chain included.
    pub fn diagnostic(&self) -> Option<String> {
        let (phase, err) = self.fatal()?;
        let mut message = format!("fatal error during {phase}: {err}");
        for cause in error_chain(err) {
            message.push_str("\n  caused by: ");
            message.push_str(&cause);
        }
        Some(message)
    }
}

/// Messages of every `source()` below `err`.
pub fn error_chain(err: &dyn Error) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_hardware_degrades() {
        let degraded: Vec<_> = PhaseKind::ALL
            .iter()
            .filter(|kind| kind.policy() == FailurePolicy::Degraded)
            .collect();
        assert_eq!(degraded, [&PhaseKind::InitHardware]);
    }

    #[test]
    fn test_phase_states_follow_lifecycle_order() {
        let mut state = LifecycleState::NotStarted;
        for kind in PhaseKind::ALL {
            assert!(state.can_transition_to(kind.state()), "{state} -> {}", kind.state());
            state = kind.state();
        }
    }

    #[test]
    fn test_diagnostic_includes_cause_chain() {
        let report = RunReport {
            exit_code: EXIT_FAILURE,
            records: vec![PhaseRecord {
                kind: PhaseKind::LoadPlugins,
                outcome: PhaseOutcome::Fatal(PhaseError::PluginLoad(PluginLoadError::Duplicate {
                    plugin: "Clock".into(),
                })),
                elapsed: Duration::ZERO,
            }],
            plugins: Vec::new(),
            cancel_reason: None,
        };

        let diagnostic = report.diagnostic().unwrap();
        assert!(diagnostic.starts_with("fatal error during load-plugins: plugin loading failed"));
        assert!(diagnostic.contains("caused by: plugin 'Clock' is declared more than once"));
    }
}
