//! Error types for the TaskPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Transport errors stay
//! inside [`ProviderError`]; what the user sees is always a [`Notice`],
//! chosen through the coarse [`FailureKind`] classification.

use thiserror::Error;

/// Failures raised while talking to a completion or search backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify this error for user-facing messaging.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::ApiError { status_code: 429, .. } => FailureKind::RateLimited,
            Self::ModelNotFound(_) => FailureKind::ModelUnavailable,
            Self::ApiError { status_code: 404, .. } => FailureKind::ModelUnavailable,
            _ => FailureKind::TransportOrParseFailure,
        }
    }

    /// Map an HTTP status from a completion boundary to an error.
    ///
    /// 429 is rate limiting, 404 means the requested model is not available
    /// to the caller's credentials, everything else is a generic API failure.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            429 => Self::RateLimited { retry_after_secs: 5 },
            404 => Self::ModelNotFound(message),
            401 | 403 => Self::AuthenticationFailed(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }
}

/// Coarse failure categories the agent loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidGuestCredential,
    RateLimited,
    ModelUnavailable,
    TransportOrParseFailure,
    LoopLimitExceeded,
    ManualStop,
}

/// A user-facing system notice.
///
/// `key()` is a stable identifier hosts can feed into their own translation
/// catalogue; `text()` is the English rendering placed in the message value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    InvalidGuestKey,
    RateLimited,
    ModelUnavailable,
    ApiAccessFailed,
    InitialTasksFailed,
    FollowupTasksFailed,
    TaskExecutionFailed,
    LoopLimitWithKey,
    LoopLimitWithoutKey,
    ManualShutdown,
    AllTasksCompleted,
}

impl Notice {
    pub fn key(&self) -> &'static str {
        match self {
            Self::InvalidGuestKey => "errors.invalid-guest-key",
            Self::RateLimited => "errors.rate-limit",
            Self::ModelUnavailable => "errors.model-unavailable",
            Self::ApiAccessFailed => "errors.accessing-apis",
            Self::InitialTasksFailed => "errors.initial-tasks",
            Self::FollowupTasksFailed => "errors.adding-additional-task",
            Self::TaskExecutionFailed => "errors.executing-task",
            Self::LoopLimitWithKey => "errors.loop-with-filled-customApiKey",
            Self::LoopLimitWithoutKey => "errors.loop-with-empty-customApiKey",
            Self::ManualShutdown => "manually-shutdown",
            Self::AllTasksCompleted => "all-tasks-completed",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::InvalidGuestKey => {
                "The guest key you entered is not valid. Enter a valid guest key or your own API key in the settings."
            }
            Self::RateLimited => {
                "The model API is rate limiting requests right now. The agent has been stopped; try again shortly."
            }
            Self::ModelUnavailable => {
                "The selected model is not available for your API key. Pick another model in the settings."
            }
            Self::ApiAccessFailed => {
                "There was an error accessing the model API. Check your API key and endpoint, then try again."
            }
            Self::InitialTasksFailed => {
                "The agent could not come up with initial tasks for this goal. Try rephrasing it."
            }
            Self::FollowupTasksFailed => {
                "Could not derive follow-up tasks from the last result. The task has been closed."
            }
            Self::TaskExecutionFailed => {
                "The agent failed while executing the current task and has been stopped."
            }
            Self::LoopLimitWithKey => {
                "This agent has reached its maximum number of loops. Raise the loop limit in the settings to let it run longer."
            }
            Self::LoopLimitWithoutKey => {
                "This agent has reached the maximum number of loops for the free tier. Add your own API key in the settings to run longer plans."
            }
            Self::ManualShutdown => "The agent has been manually shut down.",
            Self::AllTasksCompleted => "All tasks completed. Shutting down.",
        }
    }

    /// Notice for a failure kind at the initial-task stage.
    pub fn for_initial_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::RateLimited => Self::RateLimited,
            FailureKind::ModelUnavailable => Self::ModelUnavailable,
            _ => Self::InitialTasksFailed,
        }
    }

    /// Notice for a failed initial-task request.
    ///
    /// Unlike [`Notice::for_initial_failure`] this separates a backend that
    /// could not be reached from one that answered with something unusable.
    pub fn for_initial_error(err: &ProviderError) -> Self {
        match (err.kind(), err) {
            (_, ProviderError::InvalidResponse(_)) => Self::InitialTasksFailed,
            (FailureKind::TransportOrParseFailure, _) => Self::ApiAccessFailed,
            (kind, _) => Self::for_initial_failure(kind),
        }
    }

    /// Notice for a failure kind while executing a task.
    pub fn for_execution_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::RateLimited => Self::RateLimited,
            FailureKind::ModelUnavailable => Self::ModelUnavailable,
            _ => Self::TaskExecutionFailed,
        }
    }

    /// Notice for a run the agent itself ends.
    ///
    /// `keyed` picks between the two loop-limit notices and is ignored for
    /// every other kind.
    pub fn for_run_end(kind: FailureKind, keyed: bool) -> Self {
        match kind {
            FailureKind::InvalidGuestCredential => Self::InvalidGuestKey,
            FailureKind::LoopLimitExceeded if keyed => Self::LoopLimitWithKey,
            FailureKind::LoopLimitExceeded => Self::LoopLimitWithoutKey,
            FailureKind::ManualStop => Self::ManualShutdown,
            other => Self::for_execution_failure(other),
        }
    }

    /// Notice for a failure kind while deriving follow-up tasks.
    pub fn for_followup_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::RateLimited => Self::RateLimited,
            _ => Self::FollowupTasksFailed,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 500,
            message: "Upstream exploded".into(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Upstream exploded"));
    }

    #[test]
    fn run_end_notices() {
        assert_eq!(
            Notice::for_run_end(FailureKind::InvalidGuestCredential, false),
            Notice::InvalidGuestKey
        );
        assert_eq!(
            Notice::for_run_end(FailureKind::LoopLimitExceeded, true),
            Notice::LoopLimitWithKey
        );
        assert_eq!(
            Notice::for_run_end(FailureKind::LoopLimitExceeded, false),
            Notice::LoopLimitWithoutKey
        );
        assert_eq!(
            Notice::for_run_end(FailureKind::ManualStop, true),
            Notice::ManualShutdown
        );
        assert_eq!(
            Notice::for_run_end(FailureKind::RateLimited, false),
            Notice::RateLimited
        );
    }

    #[test]
    fn status_codes_classify() {
        assert_eq!(ProviderError::from_status(429, "").kind(), FailureKind::RateLimited);
        assert_eq!(
            ProviderError::from_status(404, "gpt-4").kind(),
            FailureKind::ModelUnavailable
        );
        assert_eq!(
            ProviderError::from_status(500, "boom").kind(),
            FailureKind::TransportOrParseFailure
        );
        assert_eq!(
            ProviderError::from_status(401, "bad key").kind(),
            FailureKind::TransportOrParseFailure
        );
    }

    #[test]
    fn raw_api_errors_classify_by_status() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.kind(), FailureKind::RateLimited);

        let err = ProviderError::InvalidResponse("not json".into());
        assert_eq!(err.kind(), FailureKind::TransportOrParseFailure);
    }

    #[test]
    fn notices_hide_transport_details() {
        let notice = Notice::for_initial_failure(FailureKind::TransportOrParseFailure);
        assert_eq!(notice, Notice::InitialTasksFailed);
        assert!(!notice.text().contains("status"));
        assert_eq!(
            Notice::for_followup_failure(FailureKind::ModelUnavailable),
            Notice::FollowupTasksFailed
        );
        assert_eq!(
            Notice::for_execution_failure(FailureKind::RateLimited),
            Notice::RateLimited
        );
    }

    #[test]
    fn initial_errors_separate_access_from_parse() {
        assert_eq!(
            Notice::for_initial_error(&ProviderError::Network("refused".into())),
            Notice::ApiAccessFailed
        );
        assert_eq!(
            Notice::for_initial_error(&ProviderError::InvalidResponse("no array".into())),
            Notice::InitialTasksFailed
        );
        assert_eq!(
            Notice::for_initial_error(&ProviderError::from_status(429, "")),
            Notice::RateLimited
        );
        assert_eq!(
            Notice::for_initial_error(&ProviderError::from_status(404, "gpt-4")),
            Notice::ModelUnavailable
        );
    }
}
