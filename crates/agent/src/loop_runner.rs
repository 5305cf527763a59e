//! The autonomous agent loop.

use std::sync::Arc;
use std::time::Duration;

use taskpilot_core::agent::{AgentState, ExecutionMode, PlaybackControl};
use taskpilot_core::error::{FailureKind, Notice};
use taskpilot_core::host::AgentHost;
use taskpilot_core::message::{Message, Task, TaskStatus};
use tracing::{debug, info, warn};

use crate::capability;
use crate::context::{AgentRunContext, RunControl};
use crate::gateway::{CompletionGateway, Followup};
use crate::store::MessageStore;

/// A cloneable handle for stopping a run from outside the loop.
#[derive(Clone)]
pub struct AgentHandle {
    control: Arc<RunControl>,
    store: Arc<MessageStore>,
    host: Arc<dyn AgentHost>,
}

impl AgentHandle {
    /// Stop the run.
    ///
    /// Only the first call has an effect: it emits the manual shutdown
    /// notice, clears the running flag and tells the host. Returns whether
    /// this call stopped the run.
    pub fn stop(&self) -> bool {
        let message = Message::notice(Notice::for_run_end(FailureKind::ManualStop, false));
        if !self.store.append_if(message.clone(), || self.control.halt()) {
            return false;
        }
        info!("Agent stopped manually");
        self.host.render(&message);
        self.host.shutdown();
        true
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }
}

/// What a single pass of the loop decided.
enum Pass {
    Continue,
    Done(AgentState),
}

/// Drives one goal from initial tasks to a terminal state.
pub struct AutonomousAgent {
    ctx: AgentRunContext,
    gateway: Arc<dyn CompletionGateway>,
    store: Arc<MessageStore>,
    host: Arc<dyn AgentHost>,
    state: AgentState,
}

impl AutonomousAgent {
    pub fn new(
        ctx: AgentRunContext,
        gateway: Arc<dyn CompletionGateway>,
        store: Arc<MessageStore>,
        host: Arc<dyn AgentHost>,
    ) -> Self {
        Self {
            ctx,
            gateway,
            store,
            host,
            state: AgentState::Idle,
        }
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            control: self.ctx.control.clone(),
            store: self.store.clone(),
            host: self.host.clone(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn context(&self) -> &AgentRunContext {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    fn is_running(&self) -> bool {
        self.ctx.control.is_running()
    }

    /// Record and show a message, unless the run has been stopped.
    fn emit(&self, message: Message) {
        let control = &self.ctx.control;
        if !self.store.append_if(message.clone(), || control.is_running()) {
            return;
        }
        if let Some(status) = message.status.filter(|s| s.is_transition()) {
            if let Some(task) = message.as_task() {
                debug!(task_id = %task.task_id, ?status, "Task transition");
                self.store.update_task_status(&task);
            }
        }
        self.host.render(&message);
    }

    fn emit_task(&self, task: &Task) {
        self.emit(Message::task(task));
    }

    /// End the run in `state`.
    fn finish(&mut self, state: AgentState) -> AgentState {
        self.ctx.control.halt();
        self.host.shutdown();
        self.state = state;
        info!(agent = %self.ctx.name, %state, loops = self.ctx.num_loops, "Agent finished");
        state
    }

    /// The run was stopped from outside; the handle already told the host.
    fn halted(&mut self) -> AgentState {
        self.state = AgentState::Stopped;
        debug!(agent = %self.ctx.name, "Run halted");
        AgentState::Stopped
    }

    async fn pause_for(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Start the run and drive it until it pauses or ends.
    pub async fn run(&mut self) -> AgentState {
        if self.state != AgentState::Idle {
            warn!(state = %self.state, "run() called on an agent that already ran");
            return self.state;
        }

        self.ctx.control.start();
        info!(
            agent = %self.ctx.name,
            goal = %self.ctx.goal,
            gateway = self.gateway.name(),
            "Agent starting"
        );

        if self.ctx.guest.rejects(&self.ctx.settings) {
            warn!("Rejected run: invalid guest key and no personal key");
            let notice = Notice::for_run_end(FailureKind::InvalidGuestCredential, false);
            self.emit(Message::notice(notice));
            return self.finish(AgentState::Stopped);
        }

        self.state = AgentState::Starting;
        self.emit(Message::goal(self.ctx.goal.clone()));
        self.emit(Message::thinking(None));

        let result = self
            .gateway
            .start_goal(&self.ctx.settings, &self.ctx.goal, self.ctx.language())
            .await;
        if !self.is_running() {
            return self.halted();
        }

        let values = match result {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Could not get initial tasks");
                self.emit(Message::notice(Notice::for_initial_error(&e)));
                return self.finish(AgentState::Stopped);
            }
        };

        info!(count = values.len(), "Initial tasks received");
        for value in values {
            self.pause_for(self.ctx.pacing.task_delay).await;
            if !self.is_running() {
                return self.halted();
            }
            self.emit_task(&Task::new(value, None));
        }

        self.state = AgentState::Iterating;
        if self.ctx.mode == ExecutionMode::PauseBetweenSteps {
            self.ctx.control.set_playback(PlaybackControl::Pause);
        }
        self.drive().await
    }

    /// Continue a paused run.
    pub async fn resume(&mut self) -> AgentState {
        if self.state != AgentState::Paused {
            warn!(state = %self.state, "resume() called on an agent that is not paused");
            return self.state;
        }
        if !self.is_running() {
            return self.halted();
        }
        self.ctx.control.set_playback(PlaybackControl::Play);
        self.state = AgentState::Iterating;
        self.drive().await
    }

    /// Stop the run from the owning task. See [`AgentHandle::stop`].
    pub fn stop(&mut self) -> AgentState {
        self.handle().stop();
        if !self.state.is_terminal() {
            self.state = AgentState::Stopped;
        }
        self.state
    }

    async fn drive(&mut self) -> AgentState {
        loop {
            if let Pass::Done(state) = self.step().await {
                return state;
            }
        }
    }

    /// One pass: pick the next task, execute it, derive follow-ups.
    async fn step(&mut self) -> Pass {
        if !self.is_running() {
            return Pass::Done(self.halted());
        }

        if self.ctx.mode == ExecutionMode::PauseBetweenSteps {
            match self.ctx.control.playback() {
                PlaybackControl::Pause => {
                    self.state = AgentState::Paused;
                    info!(agent = %self.ctx.name, "Agent paused");
                    self.host.on_pause(PlaybackControl::Pause);
                    return Pass::Done(AgentState::Paused);
                }
                PlaybackControl::Play => self.ctx.control.set_playback(PlaybackControl::Pause),
            }
        }

        let Some(next) = self.store.pending_tasks().into_iter().next() else {
            self.emit(Message::notice(Notice::AllTasksCompleted));
            return Pass::Done(self.finish(AgentState::Completed));
        };

        self.ctx.num_loops += 1;
        let ceiling = self.ctx.max_loops();
        debug!(loop_number = self.ctx.num_loops, ceiling, "Loop pass");
        if self.ctx.num_loops > ceiling {
            let notice = Notice::for_run_end(FailureKind::LoopLimitExceeded, self.ctx.is_keyed());
            self.emit(Message::notice(notice));
            return Pass::Done(self.finish(AgentState::LoopLimitReached));
        }

        self.pause_for(self.ctx.pacing.phase_delay).await;
        if !self.is_running() {
            return Pass::Done(self.halted());
        }

        let task = next.with_status(TaskStatus::Executing);
        self.emit_task(&task);
        self.ctx.current_task = Some(task.clone());
        self.emit(Message::thinking(Some(task.task_id.clone())));

        let analysis = capability::resolve_analysis(
            self.gateway.as_ref(),
            &self.ctx.settings,
            &self.ctx.goal,
            &task.value,
            self.ctx.web_search,
        )
        .await;
        if !self.is_running() {
            return Pass::Done(self.halted());
        }
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "Task analysis failed");
                return Pass::Done(self.fail_task(&task, Notice::for_execution_failure(e.kind())));
            }
        };

        self.emit(Message {
            task_id: Some(task.task_id.clone()),
            ..Message::system(capability::describe(&analysis))
        });

        let result = self
            .gateway
            .execute_task(
                &self.ctx.settings,
                &self.ctx.goal,
                &task.value,
                &analysis,
                self.ctx.language(),
            )
            .await;
        if !self.is_running() {
            return Pass::Done(self.halted());
        }
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, task = %task.value, "Task execution failed");
                return Pass::Done(self.fail_task(&task, Notice::for_execution_failure(e.kind())));
            }
        };

        let done = task.completed(output);
        self.emit_task(&done);
        self.ctx.completed_tasks.push(done.value.clone());
        self.ctx.current_task = Some(done.clone());

        self.pause_for(self.ctx.pacing.phase_delay).await;
        if !self.is_running() {
            return Pass::Done(self.halted());
        }
        self.emit(Message::thinking(Some(done.task_id.clone())));

        let pending: Vec<String> = self
            .store
            .pending_tasks()
            .into_iter()
            .map(|t| t.value)
            .collect();
        let result = self
            .gateway
            .create_followup_tasks(
                &self.ctx.settings,
                &self.ctx.goal,
                Followup {
                    pending: &pending,
                    last_task: &done.value,
                    result: done.info.as_deref().unwrap_or_default(),
                    completed: &self.ctx.completed_tasks,
                },
                self.ctx.language(),
            )
            .await;
        if !self.is_running() {
            return Pass::Done(self.halted());
        }

        match result {
            Ok(values) if values.is_empty() => {
                debug!(task = %done.value, "No follow-up tasks, closing branch");
                self.emit_task(&done.with_status(TaskStatus::Final));
            }
            Ok(values) => {
                debug!(count = values.len(), "Follow-up tasks received");
                for value in values {
                    self.pause_for(self.ctx.pacing.task_delay).await;
                    if !self.is_running() {
                        return Pass::Done(self.halted());
                    }
                    self.emit_task(&Task::new(value, Some(done.task_id.clone())));
                }
            }
            Err(e) if e.kind() == FailureKind::RateLimited => {
                warn!(error = %e, "Rate limited while creating follow-up tasks");
                return Pass::Done(self.fail_task(&done, Notice::RateLimited));
            }
            Err(e) => {
                warn!(error = %e, "Could not create follow-up tasks, continuing");
                self.emit(Message::notice(Notice::for_followup_failure(e.kind())));
                self.emit_task(&done.with_status(TaskStatus::Final));
            }
        }

        Pass::Continue
    }

    /// Report a failure, close the task and end the run as errored.
    fn fail_task(&mut self, task: &Task, notice: Notice) -> AgentState {
        self.emit(Message::notice(notice));
        self.emit_task(&task.with_status(TaskStatus::Final));
        self.finish(AgentState::Errored)
    }
}
