//! Lifecycle state machine.
//!
//! # States
//! ```text
//! NotStarted → Configuring → InitializingCore → InitializingHardware
//!     → LoadingPlugins → RunningUi
//! any non-terminal state → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - Forward transitions move exactly one step along the phase order
//! - Stopped is terminal

use std::fmt;

/// Where the process is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    NotStarted,
    Configuring,
    InitializingCore,
    InitializingHardware,
    LoadingPlugins,
    RunningUi,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    fn ordinal(self) -> u8 {
        match self {
            LifecycleState::NotStarted => 0,
            LifecycleState::Configuring => 1,
            LifecycleState::InitializingCore => 2,
            LifecycleState::InitializingHardware => 3,
            LifecycleState::LoadingPlugins => 4,
            LifecycleState::RunningUi => 5,
            LifecycleState::ShuttingDown => 6,
            LifecycleState::Stopped => 7,
        }
    }

    /// Return true if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        match (self, next) {
            (LifecycleState::Stopped, _) => false,
            (LifecycleState::ShuttingDown, LifecycleState::Stopped) => true,
            (LifecycleState::ShuttingDown, _) => false,
            (_, LifecycleState::ShuttingDown) => true,
            (_, LifecycleState::Stopped) => false,
            (current, next) => next.ordinal() == current.ordinal() + 1,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Stopped
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::NotStarted => "not-started",
            LifecycleState::Configuring => "configuring",
            LifecycleState::InitializingCore => "initializing-core",
            LifecycleState::InitializingHardware => "initializing-hardware",
            LifecycleState::LoadingPlugins => "loading-plugins",
            LifecycleState::RunningUi => "running-ui",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
