//! Agent run-state types.

use serde::{Deserialize, Serialize};

/// How the loop advances between passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run passes back to back until a terminal state
    #[default]
    Automatic,
    /// Stop after every pass until the host resumes
    PauseBetweenSteps,
}

/// Playback flag consulted in [`ExecutionMode::PauseBetweenSteps`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackControl {
    Play,
    #[default]
    Pause,
}

/// Lifecycle state of one agent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Starting,
    Iterating,
    Paused,
    Completed,
    LoopLimitReached,
    Stopped,
    Errored,
}

impl AgentState {
    /// States after which the run cannot continue.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::LoopLimitReached | Self::Stopped | Self::Errored
        )
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Iterating => "iterating",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::LoopLimitReached => "loop limit reached",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Automatic);
        assert_eq!(PlaybackControl::default(), PlaybackControl::Pause);
        assert_eq!(AgentState::default(), AgentState::Idle);
    }

    #[test]
    fn terminal_states() {
        assert!(AgentState::Completed.is_terminal());
        assert!(AgentState::Errored.is_terminal());
        assert!(!AgentState::Paused.is_terminal());
        assert!(!AgentState::Iterating.is_terminal());
    }
}
