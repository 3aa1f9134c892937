use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one [`Launcher`](super::Launcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherState {
    /// Idle. Initial state and the end of every completed cycle.
    Ready,
    Updating,
    Installing,
    Launching,
    /// Main launcher parked while the self-updater runs.
    SelfUpdating,
    /// Self-updater finished installing; the host must restart.
    Finalizing,
    Restarting,
    /// Last cycle failed; `reset` returns to `Ready`.
    Failed,
}

impl LauncherState {
    pub const fn as_str(self) -> &'static str {
        match self {
            LauncherState::Ready => "ready",
            LauncherState::Updating => "updating",
            LauncherState::Installing => "installing",
            LauncherState::Launching => "launching",
            LauncherState::SelfUpdating => "self_updating",
            LauncherState::Finalizing => "finalizing",
            LauncherState::Restarting => "restarting",
            LauncherState::Failed => "failed",
        }
    }
}

impl fmt::Display for LauncherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
