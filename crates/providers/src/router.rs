//! Provider construction from per-run settings.
//!
//! A run either brings its own key (and optionally its own endpoint) or
//! borrows one from the server's key pool.

use std::sync::Arc;

use rand::Rng;
use taskpilot_core::provider::Provider;
use taskpilot_core::settings::ModelSettings;

use crate::openai_compat::OpenAiCompatProvider;

/// A pool of server-held API keys. One key is drawn at random per request.
#[derive(Clone, Default)]
pub struct ServerKeys {
    keys: Vec<String>,
}

impl ServerKeys {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated key list.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(',').map(String::from).collect())
    }

    pub fn from_config(config: &taskpilot_config::AppConfig) -> Self {
        Self::new(config.server_keys())
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Pick a key at random, if any are configured.
    pub fn pick(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.keys.len());
        self.keys.get(idx).map(String::as_str)
    }
}

impl std::fmt::Debug for ServerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeys")
            .field("keys", &format!("[{} REDACTED]", self.keys.len()))
            .finish()
    }
}

/// Build a completion provider for one run.
///
/// The settings' personal key wins, together with its endpoint override.
/// Otherwise `fallback_key` (usually drawn from [`ServerKeys`]) is sent to
/// `default_base_url`; a borrowed key never goes to a caller's endpoint.
pub fn build_provider(
    settings: &ModelSettings,
    fallback_key: Option<&str>,
    default_base_url: &str,
) -> Arc<dyn Provider> {
    let personal_key = settings.personal_key();
    let api_key = personal_key.or(fallback_key).unwrap_or_default();
    let endpoint = personal_key.and(settings.endpoint());
    let base_url = endpoint.unwrap_or(default_base_url);

    let name = if endpoint.is_some() {
        "custom"
    } else {
        "openai"
    };

    tracing::debug!(provider = name, base_url, "Building completion provider");
    Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
}
