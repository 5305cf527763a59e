//! The autonomous task agent: the heart of TaskPilot.
//!
//! The agent follows a **Plan → Execute → Follow up** cycle:
//!
//! 1. **Plan**: turn the goal into a handful of initial tasks
//! 2. **Pick** the oldest pending task and choose a capability for it
//! 3. **Execute** it against the model (optionally through web search)
//! 4. **Follow up**: derive new tasks from the result, or close the branch
//!
//! The loop continues until no task is pending, the loop ceiling is hit,
//! the run is stopped, or a failure ends it. Every step is emitted as a
//! [`Message`](taskpilot_core::Message) into the [`MessageStore`] and
//! rendered by the host.

pub mod capability;
pub mod context;
pub mod gateway;
pub mod loop_runner;
pub mod parser;
pub mod prompts;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{AgentRunContext, Pacing, RunControl};
pub use gateway::{
    AgentRequest, CompletionGateway, DirectGateway, ExecuteResponse, Followup, NewTasksResponse,
    ProxyGateway, select_gateway,
};
pub use loop_runner::{AgentHandle, AutonomousAgent};
pub use store::MessageStore;
