//! Adapter state machine.
//!
//! # State Transitions
//! ```text
//! Unprovisioned → Provisioned → Running → Stopped
//!       │              │
//!       └──────────────┴──────→ Failed   (provision or start error)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unprovisioned,
    Provisioned,
    Running,
    Stopped,
    Failed,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Unprovisioned, Provisioned)
                | (Provisioned, Running)
                | (Running, Stopped)
                | (Unprovisioned, Failed)
                | (Provisioned, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Unprovisioned => "unprovisioned",
            LifecycleState::Provisioned => "provisioned",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
