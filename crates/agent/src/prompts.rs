//! Prompt builders for each agent capability.
//!
//! Every capability sends a single user message; the model is asked to
//! answer in a shape the tolerant parser can recover.

use taskpilot_core::provider::ChatMessage;

/// Actions the analyze capability may choose from.
pub const ACTIONS: [&str; 2] = ["reason", "search"];

/// Ask for the first zero to three tasks for a goal.
pub fn start_goal(goal: &str, language: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "You are TaskPilot, an autonomous task planning AI. Answer in {language}. \
         Your objective is: \"{goal}\". Create a list of zero to three tasks that \
         your AI system should carry out so that this objective is brought closer \
         to completion or fully met. Tasks may rely on a web search when they need \
         current events or short lookups. Respond ONLY with a JSON array of strings, \
         for example: [\"TASK-1\", \"TASK-2\"]."
    ))]
}

/// Ask which capability fits a task.
pub fn analyze_task(goal: &str, task: &str) -> Vec<ChatMessage> {
    let actions = ACTIONS.join(", ");
    vec![ChatMessage::user(format!(
        "Your overall objective is \"{goal}\" and you are working on the task \
         \"{task}\". Pick the best action for this task, strictly one of: {actions}. \
         Choose \"search\" only to research current events, with \"arg\" set to a \
         short, clear search query derived from the task. Choose \"reason\" for \
         everything else. Respond ONLY with a JSON object of the form \
         {{\"action\": \"string\", \"arg\": \"string\"}}."
    ))]
}

/// Ask the model to carry out one task.
pub fn execute_task(goal: &str, task: &str, language: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Answer in {language}. Your overall objective is `{goal}` and the current \
         sub-task is `{task}`. Carry out the sub-task thoroughly. When code is \
         needed, give it in markdown."
    ))]
}

/// Ask for follow-up tasks after one was executed.
pub fn create_tasks(
    goal: &str,
    pending: &[String],
    last_task: &str,
    result: &str,
    completed: &[String],
    language: &str,
) -> Vec<ChatMessage> {
    let pending = serde_json::to_string(pending).unwrap_or_default();
    let completed = serde_json::to_string(completed).unwrap_or_default();
    vec![ChatMessage::user(format!(
        "You are an AI task creation agent. Answer in {language}. Your objective is \
         `{goal}`. The tasks still open are `{pending}` and the tasks already done \
         are `{completed}`. You just finished the task `{last_task}` with this \
         result: `{result}`. Only if it is needed to move the objective forward, \
         create new tasks that are not already open or done. Respond ONLY with a \
         JSON array of strings; respond with [] when nothing is left to do."
    ))]
}

/// Ask for a summary of search snippets that answers a query.
pub fn summarize_snippets(goal: &str, query: &str, snippets: &[String]) -> Vec<ChatMessage> {
    let snippets = snippets.join("\n- ");
    vec![ChatMessage::user(format!(
        "Here are snippets from web search results:\n- {snippets}\n\nWrite a \
         summary that answers the query \"{query}\" with the objective \"{goal}\" \
         in mind, filling in gaps where necessary. Return only the summary text \
         and do not mention that it is a summary."
    ))]
}

/// The tiny request used to check a key and model before a run starts.
pub fn connection_check() -> Vec<ChatMessage> {
    vec![ChatMessage::user("Say this is a test")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_goal_mentions_goal_and_language() {
        let prompt = &start_goal("Plan a trip to Lisbon", "Português")[0].content;
        assert!(prompt.contains("Plan a trip to Lisbon"));
        assert!(prompt.contains("Português"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn analyze_lists_actions() {
        let prompt = &analyze_task("goal", "task")[0].content;
        assert!(prompt.contains("reason, search"));
        assert!(prompt.contains(r#"{"action": "string", "arg": "string"}"#));
    }

    #[test]
    fn create_tasks_embeds_lists_as_json() {
        let prompt = &create_tasks(
            "goal",
            &["open one".into()],
            "last",
            "result text",
            &["done one".into()],
            "English",
        )[0]
            .content;
        assert!(prompt.contains(r#"["open one"]"#));
        assert!(prompt.contains(r#"["done one"]"#));
        assert!(prompt.contains("result text"));
    }

    #[test]
    fn summarize_lists_snippets() {
        let prompt = &summarize_snippets("g", "q", &["one".into(), "two".into()])[0].content;
        assert!(prompt.contains("- one\n- two"));
    }
}
