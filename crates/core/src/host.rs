//! Host trait: where the agent's output goes.
//!
//! A host is whatever embeds the agent: the terminal CLI, a test harness,
//! a web session. The agent pushes every message into the store first and
//! then hands it to the host for display.

use crate::agent::PlaybackControl;
use crate::message::Message;

pub trait AgentHost: Send + Sync {
    /// Display one message.
    fn render(&self, message: &Message);

    /// The run has ended, for whatever reason.
    fn shutdown(&self);

    /// The run paused between steps and is waiting for a resume.
    fn on_pause(&self, _playback: PlaybackControl) {}
}
