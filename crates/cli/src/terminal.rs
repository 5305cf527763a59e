//! Terminal rendering of agent messages.

use std::io::Write;

use taskpilot_core::agent::PlaybackControl;
use taskpilot_core::host::AgentHost;
use taskpilot_core::message::{Message, MessageType, TaskStatus};

/// Prints every message with a local timestamp.
pub struct TerminalHost;

/// The line(s) shown for one message, without the timestamp.
pub fn format_message(message: &Message) -> Option<String> {
    let text = match message.kind {
        MessageType::Goal => format!("Embarking on a new goal: {}", message.value),
        // Only the untargeted placeholder is worth a line; task-scoped ones
        // are followed immediately by the task's own output.
        MessageType::Thinking if message.task_id.is_none() => "Thinking...".to_string(),
        MessageType::Thinking => return None,
        MessageType::Task => match message.status? {
            TaskStatus::Started => format!("Added task: {}", message.value),
            TaskStatus::Executing => format!("Executing: {}", message.value),
            TaskStatus::Completed => {
                let result = message.info.as_deref().unwrap_or_default();
                format!("Completed: {}\n{}", message.value, indent(result))
            }
            TaskStatus::Final => format!("Closed: {}", message.value),
        },
        MessageType::Action => format!(
            "{}\n{}",
            message.info.as_deref().unwrap_or("Action"),
            indent(&message.value)
        ),
        MessageType::System => message.value.clone(),
    };
    Some(text)
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl AgentHost for TerminalHost {
    fn render(&self, message: &Message) {
        if let Some(text) = format_message(message) {
            let stamp = chrono::Local::now().format("%H:%M:%S");
            println!("  [{stamp}] {text}");
        }
    }

    fn shutdown(&self) {
        println!();
        println!("  Agent shut down.");
    }

    fn on_pause(&self, _playback: PlaybackControl) {
        print!("  Paused. Press Enter to run the next task (Ctrl+C to stop) ");
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::error::Notice;
    use taskpilot_core::message::Task;

    #[test]
    fn completed_task_shows_result_indented() {
        let task = Task::new("Find flights", None).completed("Two options\nBoth cheap");
        let text = format_message(&Message::task(&task)).unwrap();
        assert_eq!(text, "Completed: Find flights\n    Two options\n    Both cheap");
    }

    #[test]
    fn task_scoped_thinking_is_hidden() {
        let task = Task::new("t", None);
        assert!(format_message(&Message::thinking(Some(task.task_id))).is_none());
        assert_eq!(format_message(&Message::thinking(None)).unwrap(), "Thinking...");
    }

    #[test]
    fn notices_print_their_text() {
        let text = format_message(&Message::notice(Notice::AllTasksCompleted)).unwrap();
        assert_eq!(text, Notice::AllTasksCompleted.text());
    }
}
