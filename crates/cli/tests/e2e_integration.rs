//! End-to-end tests for a TaskPilot run through the proxy gateway.
//!
//! Each test serves the real gateway router on a loopback port, backed by a
//! scripted model, and drives an agent against it with the proxied
//! completion gateway. Nothing leaves the machine.

use std::sync::{Arc, Mutex};

use taskpilot_agent::{AgentRunContext, AutonomousAgent, MessageStore, Pacing, ProxyGateway};
use taskpilot_config::AppConfig;
use taskpilot_core::agent::AgentState;
use taskpilot_core::error::{Notice, ProviderError};
use taskpilot_core::host::AgentHost;
use taskpilot_core::message::{Message, MessageType, TaskStatus};
use taskpilot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use taskpilot_core::settings::ModelSettings;
use taskpilot_gateway::{GatewayState, ProviderBuilder, build_router};
use taskpilot_providers::WebSearch;

// ── Scripted model ───────────────────────────────────────────────────────

/// Answers by recognising which capability prompt it was sent.
struct PromptRoutedProvider {
    initial: String,
    followups: String,
    analysis: String,
    prompts: Mutex<Vec<String>>,
}

impl PromptRoutedProvider {
    fn new(initial: &str, followups: &str) -> Arc<Self> {
        Self::with_analysis(initial, followups, r#"{"action": "reason", "arg": ""}"#)
    }

    fn with_analysis(initial: &str, followups: &str, analysis: &str) -> Arc<Self> {
        Arc::new(Self {
            initial: initial.into(),
            followups: followups.into(),
            analysis: analysis.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for PromptRoutedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request.messages[0].content.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        let content = if prompt.contains("task creation agent") {
            self.followups.clone()
        } else if prompt.contains("task planning AI") {
            self.initial.clone()
        } else if prompt.contains("Pick the best action") {
            self.analysis.clone()
        } else if prompt.contains("snippets from web search") {
            "Summary of the search results.".to_string()
        } else {
            "Result of the task.".to_string()
        };

        Ok(ProviderResponse {
            content,
            usage: None,
            model: request.model,
        })
    }
}

struct FixedSearch;

#[async_trait::async_trait]
impl WebSearch for FixedSearch {
    fn name(&self) -> &str {
        "fixed_search"
    }

    async fn search(&self, _query: &str) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["Lisbon is sunny in May.".into()])
    }
}

// ── Recording host ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingHost {
    rendered: Mutex<Vec<Message>>,
    shutdowns: Mutex<usize>,
}

impl RecordingHost {
    fn system_values(&self) -> Vec<String> {
        self.rendered
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind == MessageType::System)
            .map(|m| m.value.clone())
            .collect()
    }

    fn shutdowns(&self) -> usize {
        *self.shutdowns.lock().unwrap()
    }
}

impl AgentHost for RecordingHost {
    fn render(&self, message: &Message) {
        self.rendered.lock().unwrap().push(message.clone());
    }

    fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn server_config() -> AppConfig {
    AppConfig {
        api_key: Some("sk-server-1,sk-server-2".into()),
        ..AppConfig::default()
    }
}

/// Serve the gateway on an ephemeral port and return its base URL.
async fn spawn_gateway(
    config: AppConfig,
    provider: Arc<PromptRoutedProvider>,
    search: Option<Arc<dyn WebSearch>>,
) -> String {
    let builder: ProviderBuilder =
        Arc::new(move |_: &ModelSettings, _: Option<&str>| provider.clone() as Arc<dyn Provider>);
    let state = GatewayState::from_config(config)
        .with_provider_builder(builder)
        .with_search(search);
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn agent_for(
    base_url: &str,
    goal: &str,
    web_search: bool,
) -> (AutonomousAgent, Arc<MessageStore>, Arc<RecordingHost>) {
    let ctx = AgentRunContext::new("e2e", goal, ModelSettings::default())
        .with_web_search(web_search)
        .with_pacing(Pacing::none());
    let store = Arc::new(MessageStore::new());
    let host = Arc::new(RecordingHost::default());
    let agent = AutonomousAgent::new(
        ctx,
        Arc::new(ProxyGateway::new(base_url)),
        store.clone(),
        host.clone(),
    );
    (agent, store, host)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn proxied_run_completes_every_task() {
    let provider = PromptRoutedProvider::new(r#"["Research destinations", "Book flights"]"#, "[]");
    let url = spawn_gateway(server_config(), provider.clone(), None).await;
    let (mut agent, store, host) = agent_for(&url, "Plan a trip to Lisbon", false);

    let state = agent.run().await;

    assert_eq!(state, AgentState::Completed);
    assert!(store.pending_tasks().is_empty());
    assert_eq!(
        agent.context().completed_tasks(),
        &["Research destinations".to_string(), "Book flights".to_string()]
    );
    assert!(store.tasks().iter().all(|t| t.status == TaskStatus::Final));
    assert!(host
        .system_values()
        .contains(&Notice::AllTasksCompleted.text().to_string()));
    assert_eq!(host.shutdowns(), 1);

    // start, then execute and create for each task; no analysis without search
    assert_eq!(provider.prompts().len(), 5);
    assert!(provider.prompts()[0].contains("Plan a trip to Lisbon"));
}

#[tokio::test]
async fn proxied_run_stops_at_the_free_loop_ceiling() {
    let provider = PromptRoutedProvider::new(r#"["First step"]"#, r#"["Another step"]"#);
    let url = spawn_gateway(server_config(), provider, None).await;
    let (mut agent, _store, host) = agent_for(&url, "Never finishes", false);

    let state = agent.run().await;

    assert_eq!(state, AgentState::LoopLimitReached);
    assert_eq!(agent.context().completed_tasks().len(), 4);
    assert!(host
        .system_values()
        .contains(&Notice::LoopLimitWithoutKey.text().to_string()));
}

#[tokio::test]
async fn web_search_runs_on_the_server() {
    let provider = PromptRoutedProvider::with_analysis(
        r#"["Check the weather"]"#,
        "[]",
        r#"{"action": "search", "arg": "lisbon weather may"}"#,
    );
    let url = spawn_gateway(server_config(), provider, Some(Arc::new(FixedSearch))).await;
    let (mut agent, store, host) = agent_for(&url, "Pack for Lisbon", true);

    let state = agent.run().await;

    assert_eq!(state, AgentState::Completed);
    assert!(host
        .system_values()
        .iter()
        .any(|v| v.contains("lisbon weather may")));
    let completed = store
        .messages()
        .into_iter()
        .filter_map(|m| m.as_task())
        .find(|t| t.status == TaskStatus::Completed)
        .unwrap();
    assert_eq!(completed.info.as_deref(), Some("Summary of the search results."));
}

#[tokio::test]
async fn gateway_rate_limit_ends_the_run() {
    let mut config = server_config();
    config.gateway.rate_limit_per_minute = 1;
    let provider = PromptRoutedProvider::new(r#"["Only task"]"#, "[]");
    let url = spawn_gateway(config, provider, None).await;
    let (mut agent, store, host) = agent_for(&url, "Goal", false);

    let state = agent.run().await;

    assert_eq!(state, AgentState::Errored);
    assert!(host
        .system_values()
        .contains(&Notice::RateLimited.text().to_string()));
    assert_eq!(store.tasks()[0].status, TaskStatus::Final);
    assert_eq!(host.shutdowns(), 1);
}

#[tokio::test]
async fn gateway_without_keys_fails_the_start() {
    let provider = PromptRoutedProvider::new(r#"["Never seen"]"#, "[]");
    let url = spawn_gateway(AppConfig::default(), provider.clone(), None).await;
    let (mut agent, store, host) = agent_for(&url, "Goal", false);

    let state = agent.run().await;

    assert_eq!(state, AgentState::Stopped);
    assert!(store.tasks().is_empty());
    assert!(provider.prompts().is_empty());
    assert!(host
        .system_values()
        .contains(&Notice::ApiAccessFailed.text().to_string()));
}

#[tokio::test]
async fn unreachable_proxy_fails_the_start() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut agent, _store, host) = agent_for(&format!("http://{addr}"), "Goal", false);
    let state = agent.run().await;

    assert_eq!(state, AgentState::Stopped);
    assert!(host
        .system_values()
        .contains(&Notice::ApiAccessFailed.text().to_string()));
}
