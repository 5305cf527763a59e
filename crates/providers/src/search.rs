//! Web search providers.
//!
//! The agent only needs text snippets it can hand to a summarizing
//! completion, so the trait returns plain strings.

use async_trait::async_trait;
use serde::Deserialize;
use taskpilot_core::error::ProviderError;
use tracing::{debug, warn};

pub const SERPER_URL: &str = "https://google.serper.dev/search";

/// A backend that turns a query into result snippets.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Run a query and return the most relevant snippets, best first.
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError>;
}

/// Google search through the Serper API.
pub struct SerperSearch {
    url: String,
    api_key: String,
    max_results: usize,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_url(SERPER_URL, api_key, 5)
    }

    pub fn with_url(
        url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            url: url.into(),
            api_key: api_key.into(),
            max_results,
            client,
        }
    }

    /// Build from the `[search]` config section, if a key is present.
    pub fn from_config(config: &taskpilot_config::SearchConfig) -> Option<Self> {
        let key = config.serper_api_key.as_deref()?.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::with_url(&config.serper_url, key, config.max_results))
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        debug!(query, "Sending search request");

        let response = self
            .client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Search provider returned error");
            return Err(match status {
                429 => ProviderError::RateLimited { retry_after_secs: 5 },
                401 | 403 => ProviderError::AuthenticationFailed("Invalid search API key".into()),
                _ => ProviderError::ApiError {
                    status_code: status,
                    message: body,
                },
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let parsed: SerperResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse search results: {e}"))
        })?;

        Ok(parsed.snippets(self.max_results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    snippet: Option<String>,
}

impl SerperResponse {
    /// Direct answers first, then the knowledge graph, then organic results.
    fn snippets(self, max: usize) -> Vec<String> {
        let answer = self.answer_box.and_then(|b| b.answer.or(b.snippet));
        let graph = self.knowledge_graph.and_then(|g| g.description);

        answer
            .into_iter()
            .chain(graph)
            .chain(self.organic.into_iter().filter_map(|r| r.snippet))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(max)
            .collect()
    }
}
