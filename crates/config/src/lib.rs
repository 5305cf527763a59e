//! Configuration loading, validation, and management for TaskPilot.
//!
//! Loads configuration from `~/.taskpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskpilot_core::{GuestSettings, LoopLimits, ModelSettings};

/// The root configuration structure.
///
/// Maps directly to `~/.taskpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server-held API keys, comma separated. One is drawn per request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Loop ceilings per tier
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Guest access
    #[serde(default)]
    pub guest: GuestConfig,

    /// Presentation delays inside the agent loop
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Proxy server configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// How the CLI reaches a completion backend
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    taskpilot_core::settings::DEFAULT_MODEL.into()
}
fn default_temperature() -> f32 {
    taskpilot_core::settings::DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> u32 {
    taskpilot_core::settings::DEFAULT_MAX_TOKENS
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("limits", &self.limits)
            .field("guest", &self.guest)
            .field("pacing", &self.pacing)
            .field("search", &self.search)
            .field("gateway", &self.gateway)
            .field("client", &self.client)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Loop ceiling for runs with no key at all
    #[serde(default = "default_free_loops")]
    pub free_loops: u32,

    /// Loop ceiling for runs with a personal or guest key
    #[serde(default = "default_keyed_loops")]
    pub keyed_loops: u32,
}

fn default_free_loops() -> u32 {
    LoopLimits::default().free
}
fn default_keyed_loops() -> u32 {
    LoopLimits::default().keyed
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            free_loops: default_free_loops(),
            keyed_loops: default_keyed_loops(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GuestConfig {
    /// Accepted guest keys. Guest mode is on when any is configured.
    #[serde(default)]
    pub keys: Vec<String>,
}

impl std::fmt::Debug for GuestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestConfig")
            .field("keys", &format!("[{} REDACTED]", self.keys.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay between sibling tasks as they are emitted
    #[serde(default = "default_task_delay_ms")]
    pub task_delay_ms: u64,

    /// Delay before each execution and before follow-up generation
    #[serde(default = "default_phase_delay_ms")]
    pub phase_delay_ms: u64,
}

fn default_task_delay_ms() -> u64 {
    800
}
fn default_phase_delay_ms() -> u64 {
    1000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            task_delay_ms: default_task_delay_ms(),
            phase_delay_ms: default_phase_delay_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serper_api_key: Option<String>,

    #[serde(default = "default_serper_url")]
    pub serper_url: String,

    /// Maximum number of snippets handed to the summarizer
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_serper_url() -> String {
    "https://google.serper.dev/search".into()
}
fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            serper_api_key: None,
            serper_url: default_serper_url(),
            max_results: default_max_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("serper_api_key", &redact(&self.serper_api_key))
            .field("serper_url", &self.serper_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Request body limit in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,

    /// Capability requests allowed per client per minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}
fn default_rate_limit() -> usize {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit: default_body_limit(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a TaskPilot proxy, used when no personal key is given
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Issue a tiny completion before the first goal request
    #[serde(default = "default_true")]
    pub connection_check: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:3000".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            connection_check: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.taskpilot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `TASKPILOT_API_KEY`, then `OPENAI_API_KEY` (server key pool)
    /// - `TASKPILOT_MODEL`
    /// - `TASKPILOT_GUEST_KEYS` (comma separated)
    /// - `TASKPILOT_PROXY_URL`
    /// - `SERPER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = set("TASKPILOT_API_KEY").or_else(|| set("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = set("TASKPILOT_MODEL") {
            self.default_model = model;
        }
        if let Some(keys) = set("TASKPILOT_GUEST_KEYS") {
            self.guest.keys = split_csv(&keys);
        }
        if let Some(url) = set("TASKPILOT_PROXY_URL") {
            self.client.proxy_url = url;
        }
        if let Some(key) = set("SERPER_API_KEY") {
            self.search.serper_api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.limits.free_loops == 0 || self.limits.keyed_loops == 0 {
            return Err(ConfigError::ValidationError(
                "loop limits must be greater than zero".into(),
            ));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Check if a server key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        !self.server_keys().is_empty()
    }

    /// The server key pool.
    pub fn server_keys(&self) -> Vec<String> {
        self.api_key.as_deref().map(split_csv).unwrap_or_default()
    }

    pub fn loop_limits(&self) -> LoopLimits {
        LoopLimits {
            free: self.limits.free_loops,
            keyed: self.limits.keyed_loops,
        }
    }

    /// Resolve guest status for a caller presenting `guest_key`.
    pub fn guest_settings(&self, guest_key: Option<&str>) -> GuestSettings {
        GuestSettings::resolve(&self.guest.keys, guest_key)
    }

    /// Model settings seeded from the configured defaults.
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            custom_model_name: self.default_model.clone(),
            custom_temperature: self.default_temperature,
            custom_max_tokens: Some(self.default_max_tokens),
            ..ModelSettings::default()
        }
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            limits: LimitsConfig::default(),
            guest: GuestConfig::default(),
            pacing: PacingConfig::default(),
            search: SearchConfig::default(),
            gateway: GatewayConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
