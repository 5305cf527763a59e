//! # TaskPilot Core
//!
//! Domain types, traits, and error definitions for the TaskPilot autonomous
//! task agent. This crate has **no framework dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every outside collaborator is a trait here. Implementations live in their
//! respective crates, so completion backends and hosts can be swapped or
//! mocked in tests.

pub mod agent;
pub mod analysis;
pub mod error;
pub mod host;
pub mod message;
pub mod provider;
pub mod settings;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentState, ExecutionMode, PlaybackControl};
pub use analysis::{AgentAction, Analysis};
pub use error::{FailureKind, Notice, ProviderError};
pub use host::AgentHost;
pub use message::{Message, MessageType, Task, TaskId, TaskStatus};
pub use provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, Role, Usage};
pub use settings::{GuestSettings, LoopLimits, ModelSettings};
