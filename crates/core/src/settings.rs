//! Per-run model settings, guest authorization and loop ceilings.
//!
//! The host hands these to the agent at construction; the agent never reads
//! configuration storage itself.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 400;
pub const DEFAULT_LANGUAGE: &str = "English";

/// Model parameters chosen by the user for one run.
///
/// Field names on the wire follow the settings form of the web client.
/// Empty strings are treated the same as absent values.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub custom_api_key: String,
    pub custom_model_name: String,
    pub custom_temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_max_loops: Option<u32>,
    pub custom_language: String,
    #[serde(rename = "customEndPoint", skip_serializing_if = "Option::is_none")]
    pub custom_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_guest_key: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            custom_api_key: String::new(),
            custom_model_name: DEFAULT_MODEL.into(),
            custom_temperature: DEFAULT_TEMPERATURE,
            custom_max_loops: None,
            custom_language: String::new(),
            custom_endpoint: None,
            custom_max_tokens: Some(DEFAULT_MAX_TOKENS),
            custom_guest_key: None,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

impl ModelSettings {
    /// The user's own API key, if one was supplied.
    pub fn personal_key(&self) -> Option<&str> {
        non_empty(&self.custom_api_key)
    }

    pub fn has_personal_key(&self) -> bool {
        self.personal_key().is_some()
    }

    pub fn guest_key(&self) -> Option<&str> {
        self.custom_guest_key.as_deref().and_then(non_empty)
    }

    pub fn model(&self) -> &str {
        non_empty(&self.custom_model_name).unwrap_or(DEFAULT_MODEL)
    }

    pub fn temperature(&self) -> f32 {
        self.custom_temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.custom_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.custom_endpoint.as_deref().and_then(non_empty)
    }

    pub fn language(&self) -> &str {
        non_empty(&self.custom_language).unwrap_or(DEFAULT_LANGUAGE)
    }
}

fn redact(s: Option<&str>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("custom_api_key", &redact(self.personal_key()))
            .field("custom_model_name", &self.custom_model_name)
            .field("custom_temperature", &self.custom_temperature)
            .field("custom_max_loops", &self.custom_max_loops)
            .field("custom_language", &self.custom_language)
            .field("custom_endpoint", &self.custom_endpoint)
            .field("custom_max_tokens", &self.custom_max_tokens)
            .field("custom_guest_key", &redact(self.guest_key()))
            .finish()
    }
}

/// Guest-mode authorization for the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSettings {
    pub is_valid_guest: bool,
    pub is_guest_mode: bool,
}

impl GuestSettings {
    /// Resolve guest status from the configured key list.
    ///
    /// Guest mode is active when at least one non-empty key is configured;
    /// the caller is a valid guest when its key matches one exactly.
    pub fn resolve(configured_keys: &[String], guest_key: Option<&str>) -> Self {
        let keys: Vec<&str> = configured_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        let is_valid_guest = guest_key.is_some_and(|g| keys.contains(&g));
        Self {
            is_valid_guest,
            is_guest_mode: !keys.is_empty(),
        }
    }

    /// Whether a run with these settings must be refused up front.
    pub fn rejects(&self, settings: &ModelSettings) -> bool {
        self.is_guest_mode && !self.is_valid_guest && !settings.has_personal_key()
    }
}

/// Tiered loop ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopLimits {
    /// Ceiling without any key
    pub free: u32,
    /// Ceiling with a personal or guest key, unless overridden
    pub keyed: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self { free: 4, keyed: 10 }
    }
}

impl LoopLimits {
    /// Whether a run with these settings is on the keyed tier.
    ///
    /// A guest key only counts once the deployment has accepted it.
    pub fn is_keyed(settings: &ModelSettings, guest: &GuestSettings) -> bool {
        settings.has_personal_key() || (guest.is_valid_guest && settings.guest_key().is_some())
    }

    /// Maximum number of loop passes a run with these settings may take.
    ///
    /// An override of zero falls back to the keyed tier.
    pub fn ceiling(&self, settings: &ModelSettings, guest: &GuestSettings) -> u32 {
        if Self::is_keyed(settings, guest) {
            settings
                .custom_max_loops
                .filter(|n| *n > 0)
                .unwrap_or(self.keyed)
        } else {
            self.free
        }
    }
}
