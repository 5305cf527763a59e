//! Capability analysis returned for a task.

use serde::{Deserialize, Deserializer, Serialize};

/// The capability chosen to execute a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentAction {
    #[default]
    Reason,
    Search,
}

impl AgentAction {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Self::Search,
            _ => Self::Reason,
        }
    }
}

// Unknown actions read as `reason` instead of failing the whole analysis.
impl<'de> Deserialize<'de> for AgentAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// `{ action, arg }` as produced by the analyze capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub action: AgentAction,
    #[serde(default)]
    pub arg: String,
}

impl Analysis {
    /// Plain reasoning with no argument.
    pub fn reason() -> Self {
        Self::default()
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            action: AgentAction::Search,
            arg: query.into(),
        }
    }

    pub fn is_search(&self) -> bool {
        self.action == AgentAction::Search
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_reads_as_reason() {
        let a: Analysis =
            serde_json::from_str(r#"{"action":"browse","arg":"x"}"#).unwrap();
        assert_eq!(a.action, AgentAction::Reason);
        assert_eq!(a.arg, "x");
    }

    #[test]
    fn search_action_parses() {
        let a: Analysis =
            serde_json::from_str(r#"{"action":"Search","arg":"rust news"}"#).unwrap();
        assert!(a.is_search());
        assert_eq!(serde_json::to_value(&a).unwrap()["action"], "search");
    }

    #[test]
    fn missing_fields_default() {
        let a: Analysis = serde_json::from_str("{}").unwrap();
        assert_eq!(a, Analysis::reason());
    }
}
