//! Message and Task domain types.
//!
//! These are the value objects that flow out of the agent loop:
//! Agent emits a message → Store records it → Host renders it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Notice;

/// Unique identifier for a task within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of event a message records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// The user's goal, emitted once at the start of a run
    Goal,
    /// Placeholder shown while a remote call is in flight
    Thinking,
    /// Mirror of a task entity at one point of its lifecycle
    Task,
    /// Free-form action output
    Action,
    /// User-facing notices (errors, completion, loop limits)
    System,
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Executing,
    Completed,
    Final,
}

impl TaskStatus {
    /// Statuses that describe an already existing task rather than a new one.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Executing | Self::Completed | Self::Final)
    }
}

/// A single entry in the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    pub value: String,

    /// Only set on Task-typed messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl Message {
    fn new(kind: MessageType, value: impl Into<String>) -> Self {
        Self {
            kind,
            task_id: None,
            parent_task_id: None,
            info: None,
            value: value.into(),
            status: None,
        }
    }

    /// The goal message that opens every run.
    pub fn goal(goal: impl Into<String>) -> Self {
        Self::new(MessageType::Goal, goal)
    }

    /// A thinking placeholder, optionally scoped to a task.
    pub fn thinking(task_id: Option<TaskId>) -> Self {
        Self {
            task_id,
            ..Self::new(MessageType::Thinking, "")
        }
    }

    /// A free-form system message.
    pub fn system(value: impl Into<String>) -> Self {
        Self::new(MessageType::System, value)
    }

    /// A system message carrying one of the well-known notices.
    pub fn notice(notice: Notice) -> Self {
        Self {
            info: Some(notice.key().to_string()),
            ..Self::new(MessageType::System, notice.text())
        }
    }

    /// An action message with a headline and body.
    pub fn action(info: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            info: Some(info.into()),
            ..Self::new(MessageType::Action, value)
        }
    }

    /// Mirror a task into the log at its current status.
    pub fn task(task: &Task) -> Self {
        Self {
            kind: MessageType::Task,
            task_id: Some(task.task_id.clone()),
            parent_task_id: task.parent_task_id.clone(),
            info: task.info.clone(),
            value: task.value.clone(),
            status: Some(task.status),
        }
    }

    pub fn is_task(&self) -> bool {
        self.kind == MessageType::Task
    }

    /// Reconstruct the task a Task-typed message mirrors.
    ///
    /// Returns `None` for other message types or when the id is missing.
    pub fn as_task(&self) -> Option<Task> {
        if !self.is_task() {
            return None;
        }
        Some(Task {
            task_id: self.task_id.clone()?,
            parent_task_id: self.parent_task_id.clone(),
            value: self.value.clone(),
            status: self.status.unwrap_or(TaskStatus::Started),
            info: self.info.clone(),
        })
    }
}

/// A unit of work derived from the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,

    /// The task description
    pub value: String,

    pub status: TaskStatus,

    /// Result text once executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl Task {
    /// Create a fresh `Started` task with a new id.
    pub fn new(value: impl Into<String>, parent_task_id: Option<TaskId>) -> Self {
        Self {
            task_id: TaskId::new(),
            parent_task_id,
            value: value.into(),
            status: TaskStatus::Started,
            info: None,
        }
    }

    /// The same task at a new status.
    pub fn with_status(&self, status: TaskStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// The same task marked completed with its result.
    pub fn completed(&self, result: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Completed,
            info: Some(result.into()),
            ..self.clone()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique() {
        let a = Task::new("Find flights", None);
        let b = Task::new("Find flights", None);
        assert_ne!(a.task_id, b.task_id);
        assert!(a.is_pending());
    }

    #[test]
    fn task_message_mirrors_task() {
        let parent = Task::new("Plan", None);
        let child = Task::new("Book hotel", Some(parent.task_id.clone()));
        let msg = Message::task(&child);

        assert_eq!(msg.kind, MessageType::Task);
        assert_eq!(msg.status, Some(TaskStatus::Started));
        assert_eq!(msg.parent_task_id.as_ref(), Some(&parent.task_id));
        assert_eq!(msg.as_task(), Some(child));
    }

    #[test]
    fn non_task_messages_are_not_tasks() {
        assert!(Message::goal("Plan a trip").as_task().is_none());
        assert!(Message::thinking(None).as_task().is_none());
    }

    #[test]
    fn completed_carries_result() {
        let task = Task::new("Find flights", None).completed("Three options found");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.info.as_deref(), Some("Three options found"));
        assert!(TaskStatus::Completed.is_transition());
        assert!(!TaskStatus::Started.is_transition());
    }

    #[test]
    fn message_wire_shape() {
        let task = Task::new("Find flights", None);
        let json = serde_json::to_value(Message::task(&task)).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["status"], "started");
        assert_eq!(json["taskId"], task.task_id.as_str());
        assert!(json.get("parentTaskId").is_none());
    }

    #[test]
    fn notice_message_carries_key() {
        let msg = Message::notice(Notice::AllTasksCompleted);
        assert_eq!(msg.kind, MessageType::System);
        assert_eq!(msg.info.as_deref(), Some("all-tasks-completed"));
        assert_eq!(msg.value, Notice::AllTasksCompleted.text());
    }
}
