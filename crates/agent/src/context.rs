//! Per-run context and the shared run control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use taskpilot_config::PacingConfig;
use taskpilot_core::agent::{ExecutionMode, PlaybackControl};
use taskpilot_core::message::Task;
use taskpilot_core::settings::{GuestSettings, LoopLimits, ModelSettings};

/// Presentation delays between emitted messages. Zero is always valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// Between sibling tasks as they are emitted
    pub task_delay: Duration,
    /// Before each execution and before follow-up generation
    pub phase_delay: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self {
            task_delay: Duration::from_millis(config.task_delay_ms),
            phase_delay: Duration::from_millis(config.phase_delay_ms),
        }
    }
}

/// The part of a run other tasks may touch: the running flag and playback.
#[derive(Debug, Default)]
pub struct RunControl {
    running: AtomicBool,
    playback: Mutex<PlaybackControl>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clear the running flag. Returns whether it was set.
    pub fn halt(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn playback(&self) -> PlaybackControl {
        *self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_playback(&self, playback: PlaybackControl) {
        *self.playback.lock().unwrap_or_else(PoisonError::into_inner) = playback;
    }
}

/// Everything one agent run owns.
#[derive(Debug)]
pub struct AgentRunContext {
    pub name: String,
    pub goal: String,
    pub settings: ModelSettings,
    pub mode: ExecutionMode,
    pub web_search: bool,
    pub guest: GuestSettings,
    pub limits: LoopLimits,
    pub pacing: Pacing,
    pub(crate) control: Arc<RunControl>,
    pub(crate) completed_tasks: Vec<String>,
    pub(crate) num_loops: u32,
    pub(crate) current_task: Option<Task>,
}

impl AgentRunContext {
    pub fn new(name: impl Into<String>, goal: impl Into<String>, settings: ModelSettings) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            settings,
            mode: ExecutionMode::Automatic,
            web_search: false,
            guest: GuestSettings::default(),
            limits: LoopLimits::default(),
            pacing: Pacing::default(),
            control: Arc::new(RunControl::new()),
            completed_tasks: Vec::new(),
            num_loops: 0,
            current_task: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn with_guest(mut self, guest: GuestSettings) -> Self {
        self.guest = guest;
        self
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn language(&self) -> &str {
        self.settings.language()
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    /// Values of the tasks executed so far, in order.
    pub fn completed_tasks(&self) -> &[String] {
        &self.completed_tasks
    }

    pub fn num_loops(&self) -> u32 {
        self.num_loops
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    /// The loop ceiling for this run.
    pub fn max_loops(&self) -> u32 {
        self.limits.ceiling(&self.settings, &self.guest)
    }

    /// Whether this run is on the keyed loop tier.
    pub fn is_keyed(&self) -> bool {
        LoopLimits::is_keyed(&self.settings, &self.guest)
    }
}
