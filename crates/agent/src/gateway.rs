//! Completion gateways: how the agent reaches its four capabilities.
//!
//! A run talks to the model either directly, with the user's own key, or
//! through a TaskPilot proxy that holds server-side keys. The strategy is
//! picked once per run by [`select_gateway`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use taskpilot_config::AppConfig;
use taskpilot_core::analysis::Analysis;
use taskpilot_core::error::ProviderError;
use taskpilot_core::provider::{ChatMessage, Provider, ProviderRequest};
use taskpilot_core::settings::ModelSettings;
use taskpilot_providers::{WebSearch, build_provider};
use tracing::{debug, warn};

use crate::{parser, prompts};

/// Inputs for deriving follow-up tasks.
#[derive(Debug, Clone, Copy)]
pub struct Followup<'a> {
    /// Values of the tasks still pending
    pub pending: &'a [String],
    pub last_task: &'a str,
    pub result: &'a str,
    /// Values of every task executed so far
    pub completed: &'a [String],
}

/// The four remote capabilities the agent loop needs.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Turn a goal into its first tasks. A reply without a readable task
    /// list is an error.
    async fn start_goal(
        &self,
        settings: &ModelSettings,
        goal: &str,
        language: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Derive new tasks after one was executed. `[]` means nothing is left.
    async fn create_followup_tasks(
        &self,
        settings: &ModelSettings,
        goal: &str,
        followup: Followup<'_>,
        language: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Choose a capability for a task.
    async fn analyze_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
    ) -> Result<Analysis, ProviderError>;

    /// Carry out a task and return the result text.
    async fn execute_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
        analysis: &Analysis,
        language: &str,
    ) -> Result<String, ProviderError>;
}

// --- Direct strategy ---

/// Calls a completion provider directly.
pub struct DirectGateway {
    provider: Arc<dyn Provider>,
    search: Option<Arc<dyn WebSearch>>,
    connection_check: bool,
    checked: AtomicBool,
}

impl DirectGateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            search: None,
            connection_check: false,
            checked: AtomicBool::new(false),
        }
    }

    /// Attach a web search backend for `search` analyses.
    pub fn with_search(mut self, search: Option<Arc<dyn WebSearch>>) -> Self {
        self.search = search;
        self
    }

    /// Issue a tiny completion before the first goal request so that a bad
    /// key or an unavailable model fails before any task is shown.
    pub fn with_connection_check(mut self, enabled: bool) -> Self {
        self.connection_check = enabled;
        self
    }

    async fn complete(
        &self,
        settings: &ModelSettings,
        messages: Vec<ChatMessage>,
    ) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: settings.model().to_string(),
            messages,
            temperature: settings.temperature(),
            max_tokens: Some(settings.max_tokens()),
        };
        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }

    async fn check_connection(&self, settings: &ModelSettings) -> Result<(), ProviderError> {
        if !self.connection_check || self.checked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(model = settings.model(), "Checking model connection");
        self.provider
            .complete(ProviderRequest {
                model: settings.model().to_string(),
                messages: prompts::connection_check(),
                temperature: 0.0,
                max_tokens: Some(7),
            })
            .await?;
        Ok(())
    }

    async fn search_and_summarize(
        &self,
        search: &dyn WebSearch,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
        query: &str,
        language: &str,
    ) -> Result<String, ProviderError> {
        let snippets = search.search(query).await?;
        if snippets.is_empty() {
            debug!(query, "Search returned nothing, reasoning instead");
            return self
                .complete(settings, prompts::execute_task(goal, task, language))
                .await;
        }
        self.complete(settings, prompts::summarize_snippets(goal, query, &snippets))
            .await
    }
}

#[async_trait]
impl CompletionGateway for DirectGateway {
    fn name(&self) -> &str {
        "direct"
    }

    async fn start_goal(
        &self,
        settings: &ModelSettings,
        goal: &str,
        language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.check_connection(settings).await?;
        let text = self
            .complete(settings, prompts::start_goal(goal, language))
            .await?;
        parser::parse_task_list(&text)
    }

    async fn create_followup_tasks(
        &self,
        settings: &ModelSettings,
        goal: &str,
        followup: Followup<'_>,
        language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let prompt = prompts::create_tasks(
            goal,
            followup.pending,
            followup.last_task,
            followup.result,
            followup.completed,
            language,
        );
        let text = self.complete(settings, prompt).await?;
        parser::parse_task_list(&text)
    }

    async fn analyze_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
    ) -> Result<Analysis, ProviderError> {
        let text = self
            .complete(settings, prompts::analyze_task(goal, task))
            .await?;
        Ok(parser::parse_analysis(&text))
    }

    async fn execute_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
        analysis: &Analysis,
        language: &str,
    ) -> Result<String, ProviderError> {
        if analysis.is_search() {
            match &self.search {
                Some(search) => {
                    return self
                        .search_and_summarize(
                            search.as_ref(),
                            settings,
                            goal,
                            task,
                            &analysis.arg,
                            language,
                        )
                        .await;
                }
                None => warn!(task, "No search backend configured, reasoning instead"),
            }
        }
        self.complete(settings, prompts::execute_task(goal, task, language))
            .await
    }
}

// --- Proxy strategy ---

/// JSON body of every proxy endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    #[serde(default)]
    pub model_settings: ModelSettings,
    pub goal: String,
    #[serde(default)]
    pub custom_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_tasks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl AgentRequest {
    pub fn new(settings: &ModelSettings, goal: &str, language: &str) -> Self {
        Self {
            model_settings: settings.clone(),
            goal: goal.to_string(),
            custom_language: language.to_string(),
            ..Self::default()
        }
    }
}

/// `{ "newTasks": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTasksResponse {
    pub new_tasks: Vec<String>,
}

/// `{ "response": "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub response: String,
}

/// Calls a TaskPilot proxy over HTTP.
pub struct ProxyGateway {
    base_url: String,
    client: reqwest::Client,
}

impl ProxyGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &AgentRequest,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/api/agent/{endpoint}", self.base_url);
        debug!(%url, "Posting to proxy");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            warn!(status, endpoint, "Proxy returned error");
            return Err(match status {
                429 => ProviderError::RateLimited {
                    retry_after_secs: retry_after.unwrap_or(5),
                },
                404 => ProviderError::ModelNotFound(text),
                _ => ProviderError::ApiError {
                    status_code: status,
                    message: text,
                },
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("unexpected proxy reply: {e}")))
    }
}

fn clean(tasks: Vec<String>) -> Vec<String> {
    tasks
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[async_trait]
impl CompletionGateway for ProxyGateway {
    fn name(&self) -> &str {
        "proxy"
    }

    async fn start_goal(
        &self,
        settings: &ModelSettings,
        goal: &str,
        language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let body = AgentRequest::new(settings, goal, language);
        let reply: NewTasksResponse = self.post("start", &body).await?;
        Ok(clean(reply.new_tasks))
    }

    async fn create_followup_tasks(
        &self,
        settings: &ModelSettings,
        goal: &str,
        followup: Followup<'_>,
        language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let body = AgentRequest {
            tasks: Some(followup.pending.to_vec()),
            last_task: Some(followup.last_task.to_string()),
            result: Some(followup.result.to_string()),
            completed_tasks: Some(followup.completed.to_vec()),
            ..AgentRequest::new(settings, goal, language)
        };
        let reply: NewTasksResponse = self.post("create", &body).await?;
        Ok(clean(reply.new_tasks))
    }

    async fn analyze_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
    ) -> Result<Analysis, ProviderError> {
        let body = AgentRequest {
            task: Some(task.to_string()),
            ..AgentRequest::new(settings, goal, settings.language())
        };
        self.post("analyze", &body).await
    }

    async fn execute_task(
        &self,
        settings: &ModelSettings,
        goal: &str,
        task: &str,
        analysis: &Analysis,
        language: &str,
    ) -> Result<String, ProviderError> {
        let body = AgentRequest {
            task: Some(task.to_string()),
            analysis: Some(analysis.clone()),
            ..AgentRequest::new(settings, goal, language)
        };
        let reply: ExecuteResponse = self.post("execute", &body).await?;
        Ok(reply.response)
    }
}

/// Pick the strategy for a run.
///
/// A personal key means the user pays for their own calls, so the provider
/// is called directly. Without one every call goes through the proxy.
pub fn select_gateway(
    settings: &ModelSettings,
    config: &AppConfig,
    search: Option<Arc<dyn WebSearch>>,
) -> Arc<dyn CompletionGateway> {
    let timeout = Duration::from_secs(config.client.timeout_secs);
    if settings.has_personal_key() {
        debug!("Using direct completion gateway");
        let provider = build_provider(settings, None, &config.api_url);
        Arc::new(
            DirectGateway::new(provider)
                .with_search(search)
                .with_connection_check(config.client.connection_check),
        )
    } else {
        debug!(proxy = %config.client.proxy_url, "Using proxied completion gateway");
        Arc::new(ProxyGateway::with_timeout(&config.client.proxy_url, timeout))
    }
}
