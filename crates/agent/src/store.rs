//! The message/task store.
//!
//! Holds the ordered message log of a run and the task list derived from
//! it. The agent is the only writer; hosts read snapshots.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use taskpilot_core::message::{Message, Task, TaskId, TaskStatus};

#[derive(Debug, Default)]
struct StoreState {
    messages: Vec<Message>,
    /// Newest first
    tasks: Vec<Task>,
}

/// In-memory message log and task list for one run.
#[derive(Debug, Default)]
pub struct MessageStore {
    state: RwLock<StoreState>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message to the log.
    ///
    /// A message is placed right after the last message sharing its task id,
    /// which keeps a task's messages grouped. Messages without a task id go
    /// to the end. A Task message that is not a status transition also
    /// registers a new task.
    pub fn append(&self, message: Message) {
        Self::insert(&mut self.write(), message);
    }

    /// Append a message only if `admit` holds.
    ///
    /// `admit` runs under the write lock, so a check made there and the
    /// append cannot be separated by another writer. Returns whether the
    /// message was appended.
    pub fn append_if(&self, message: Message, admit: impl FnOnce() -> bool) -> bool {
        let mut state = self.write();
        if !admit() {
            return false;
        }
        Self::insert(&mut state, message);
        true
    }

    fn insert(state: &mut StoreState, message: Message) {
        let position = message
            .task_id
            .as_ref()
            .and_then(|id| {
                state
                    .messages
                    .iter()
                    .rposition(|m| m.task_id.as_ref() == Some(id))
            })
            .map(|i| i + 1)
            .unwrap_or(state.messages.len());

        let is_new_task = message.is_task()
            && !message.status.is_some_and(|s| s.is_transition());
        if is_new_task {
            if let Some(task) = message.as_task() {
                state.tasks.insert(0, task);
            }
        }

        state.messages.insert(position, message);
    }

    /// Record a status transition for a known task.
    ///
    /// Only Executing, Completed and Final are accepted; anything else, or an
    /// unknown id, is ignored.
    pub fn update_task_status(&self, updated: &Task) {
        if !updated.status.is_transition() {
            return;
        }
        let mut state = self.write();
        if let Some(task) = state
            .tasks
            .iter_mut()
            .find(|t| t.task_id == updated.task_id)
        {
            task.status = updated.status;
            task.info = updated.info.clone();
        }
    }

    /// Remove a task from the task list. The message log is untouched.
    pub fn delete_task(&self, task_id: &TaskId) {
        self.write().tasks.retain(|t| &t.task_id != task_id);
    }

    /// Tasks still waiting to be executed, oldest first.
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.read()
            .tasks
            .iter()
            .rev()
            .filter(|t| t.status == TaskStatus::Started)
            .cloned()
            .collect()
    }

    /// All tasks, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<Task> {
        self.read()
            .tasks
            .iter()
            .find(|t| &t.task_id == task_id)
            .cloned()
    }

    /// A snapshot of the message log.
    pub fn messages(&self) -> Vec<Message> {
        self.read().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.read().messages.len()
    }

    /// Clear messages and tasks.
    pub fn reset(&self) {
        let mut state = self.write();
        state.messages.clear();
        state.tasks.clear();
    }
}
