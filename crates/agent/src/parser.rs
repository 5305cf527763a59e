//! Tolerant parsing of model output.
//!
//! Models wrap JSON in prose or code fences. The parser cuts the outermost
//! array or object out of the text and reads that.

use taskpilot_core::analysis::Analysis;
use taskpilot_core::error::ProviderError;
use tracing::warn;

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Extract a list of task strings.
///
/// Takes everything between the first `[` and the last `]`. Non-string
/// items are dropped and blank strings removed. A missing or malformed
/// array is an error, never an empty list.
pub fn parse_task_list(text: &str) -> Result<Vec<String>, ProviderError> {
    let slice = slice_between(text, '[', ']').ok_or_else(|| {
        ProviderError::InvalidResponse(format!("no task array in model output: {}", preview(text)))
    })?;

    let values: Vec<serde_json::Value> = serde_json::from_str(slice)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed task array: {e}")))?;

    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect())
}

/// Extract an analysis object.
///
/// Anything unreadable degrades to plain reasoning.
pub fn parse_analysis(text: &str) -> Analysis {
    let parsed = slice_between(text, '{', '}')
        .and_then(|slice| serde_json::from_str::<Analysis>(slice).ok());

    match parsed {
        Some(analysis) => analysis,
        None => {
            warn!(output = %preview(text), "Unreadable analysis, falling back to reason");
            Analysis::reason()
        }
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::analysis::AgentAction;

    #[test]
    fn plain_array() {
        assert_eq!(
            parse_task_list(r#"["Find flights", "Book hotel"]"#).unwrap(),
            vec!["Find flights", "Book hotel"]
        );
    }

    #[test]
    fn array_wrapped_in_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n[\"a\", \"b\"]\n```\nGood luck.";
        assert_eq!(parse_task_list(text).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn non_strings_and_blanks_are_dropped() {
        let text = r#"["a", 3, null, "  ", {"x": 1}, " b "]"#;
        assert_eq!(parse_task_list(text).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_task_list("[]").unwrap().is_empty());
    }

    #[test]
    fn missing_array_is_an_error() {
        assert!(matches!(
            parse_task_list("I cannot help with that."),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(parse_task_list("] backwards [").is_err());
        assert!(parse_task_list("[\"unterminated\"").is_err());
    }

    #[test]
    fn analysis_object_in_prose() {
        let a = parse_analysis(r#"Answer: {"action": "search", "arg": "weather lisbon"} done"#);
        assert_eq!(a.action, AgentAction::Search);
        assert_eq!(a.arg, "weather lisbon");
    }

    #[test]
    fn malformed_analysis_degrades_to_reason() {
        assert_eq!(parse_analysis("search for it"), Analysis::reason());
        assert_eq!(parse_analysis(r#"{"action": }"#), Analysis::reason());
    }

    #[test]
    fn unknown_action_is_reason() {
        let a = parse_analysis(r#"{"action": "browse", "arg": "x"}"#);
        assert_eq!(a.action, AgentAction::Reason);
    }
}
