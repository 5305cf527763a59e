//! Capability selection: reason or search.

use taskpilot_core::analysis::{AgentAction, Analysis};
use taskpilot_core::error::{FailureKind, ProviderError};
use taskpilot_core::settings::ModelSettings;
use tracing::warn;

use crate::gateway::CompletionGateway;

/// Decide how a task will be executed.
///
/// With web search disabled the gateway is not consulted. A failed analysis
/// falls back to reasoning unless the backend is rate limiting us, in which
/// case the error is returned so the run can end.
pub async fn resolve_analysis(
    gateway: &dyn CompletionGateway,
    settings: &ModelSettings,
    goal: &str,
    task: &str,
    web_search: bool,
) -> Result<Analysis, ProviderError> {
    if !web_search {
        return Ok(Analysis::reason());
    }

    match gateway.analyze_task(settings, goal, task).await {
        Ok(analysis) => Ok(analysis),
        Err(e) if e.kind() == FailureKind::RateLimited => Err(e),
        Err(e) => {
            warn!(error = %e, task, "Task analysis failed, reasoning instead");
            Ok(Analysis::reason())
        }
    }
}

/// The system text shown before a task runs.
pub fn describe(analysis: &Analysis) -> String {
    match analysis.action {
        AgentAction::Search => format!("Searching the web for \"{}\"...", analysis.arg),
        AgentAction::Reason => "Generating a response...".to_string(),
    }
}
