//! Shared test doubles for the agent crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use taskpilot_core::agent::PlaybackControl;
use taskpilot_core::analysis::Analysis;
use taskpilot_core::error::ProviderError;
use taskpilot_core::host::AgentHost;
use taskpilot_core::message::{Message, MessageType, TaskStatus};
use taskpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use taskpilot_core::settings::ModelSettings;
use taskpilot_providers::WebSearch;

use crate::gateway::{CompletionGateway, Followup};
use crate::loop_runner::AgentHandle;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next result in the queue.
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider answering each call with the next text.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockProvider: no more responses (call #{call})"))
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A search backend returning fixed snippets and recording queries.
pub struct MockSearch {
    snippets: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new(snippets: Vec<String>) -> Self {
        Self {
            snippets,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    fn name(&self) -> &str {
        "mock_search"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.snippets.clone())
    }
}

/// How often each capability was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub start: usize,
    pub create: usize,
    pub analyze: usize,
    pub execute: usize,
}

/// A gateway answering from per-capability queues.
///
/// Empty queues answer with no tasks, a `reason` analysis, and an
/// execution result of `done: <task>`.
#[derive(Default)]
pub struct ScriptedGateway {
    start: Mutex<VecDeque<Result<Vec<String>, ProviderError>>>,
    create: Mutex<VecDeque<Result<Vec<String>, ProviderError>>>,
    analyze: Mutex<VecDeque<Result<Analysis, ProviderError>>>,
    execute: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<GatewayCalls>,
    followup_inputs: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(tasks: &[&str]) -> Self {
        let gateway = Self::new();
        gateway.push_start(Ok(tasks.iter().map(|t| t.to_string()).collect()));
        gateway
    }

    pub fn push_start(&self, result: Result<Vec<String>, ProviderError>) {
        self.start.lock().unwrap().push_back(result);
    }

    pub fn push_create(&self, result: Result<Vec<String>, ProviderError>) {
        self.create.lock().unwrap().push_back(result);
    }

    pub fn push_followups(&self, tasks: &[&str]) {
        self.push_create(Ok(tasks.iter().map(|t| t.to_string()).collect()));
    }

    pub fn push_analysis(&self, result: Result<Analysis, ProviderError>) {
        self.analyze.lock().unwrap().push_back(result);
    }

    pub fn push_execute(&self, result: Result<String, ProviderError>) {
        self.execute.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> GatewayCalls {
        *self.calls.lock().unwrap()
    }

    /// `(pending, completed)` as seen by each follow-up request.
    pub fn followup_inputs(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.followup_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start_goal(
        &self,
        _settings: &ModelSettings,
        _goal: &str,
        _language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.lock().unwrap().start += 1;
        self.start.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
    }

    async fn create_followup_tasks(
        &self,
        _settings: &ModelSettings,
        _goal: &str,
        followup: Followup<'_>,
        _language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.lock().unwrap().create += 1;
        self.followup_inputs
            .lock()
            .unwrap()
            .push((followup.pending.to_vec(), followup.completed.to_vec()));
        self.create.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
    }

    async fn analyze_task(
        &self,
        _settings: &ModelSettings,
        _goal: &str,
        _task: &str,
    ) -> Result<Analysis, ProviderError> {
        self.calls.lock().unwrap().analyze += 1;
        self.analyze
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Analysis::reason()))
    }

    async fn execute_task(
        &self,
        _settings: &ModelSettings,
        _goal: &str,
        task: &str,
        _analysis: &Analysis,
        _language: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().execute += 1;
        self.execute
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("done: {task}")))
    }
}

/// A host that records everything it is shown.
///
/// With a stop trigger armed, the host stops the run the first time it
/// renders a task at that status.
#[derive(Default)]
pub struct RecordingHost {
    rendered: Mutex<Vec<Message>>,
    shutdowns: Mutex<usize>,
    pauses: Mutex<usize>,
    stop_on: OnceLock<(TaskStatus, AgentHandle)>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stop_when_rendering(&self, status: TaskStatus, handle: AgentHandle) {
        let _ = self.stop_on.set((status, handle));
    }

    pub fn rendered(&self) -> Vec<Message> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        *self.shutdowns.lock().unwrap()
    }

    pub fn pauses(&self) -> usize {
        *self.pauses.lock().unwrap()
    }

    /// Values of rendered system messages.
    pub fn system_values(&self) -> Vec<String> {
        self.rendered()
            .into_iter()
            .filter(|m| m.kind == MessageType::System)
            .map(|m| m.value)
            .collect()
    }
}

impl AgentHost for RecordingHost {
    fn render(&self, message: &Message) {
        self.rendered.lock().unwrap().push(message.clone());
        if let Some((status, handle)) = self.stop_on.get() {
            if message.status == Some(*status) {
                handle.stop();
            }
        }
    }

    fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }

    fn on_pause(&self, _playback: PlaybackControl) {
        *self.pauses.lock().unwrap() += 1;
    }
}
