use super::session::ChatSession;
use crate::error::AgentResult;
use inquire::{InquireError, Text};
use tracing::error;

/// Line-oriented terminal I/O for the chat
pub trait Console {
    /// Next line from the user; `None` when input has ended
    fn read_line(&mut self) -> AgentResult<Option<String>>;
    fn write_line(&mut self, text: &str);
}

/// The real terminal
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn read_line(&mut self) -> AgentResult<Option<String>> {
        match Text::new("You:").prompt() {
            Ok(line) => Ok(Some(line)),
            Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_line(&mut self, text: &str) {
        println!("{}", text);
    }
}

pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "quit" | "exit")
}

/// Read-eval-print loop; returns when the user leaves or on the first error
pub async fn run<C: Console>(session: &mut ChatSession, console: &mut C) {
    loop {
        let line = match console.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                console.write_line("Agent: Goodbye!");
                return;
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                console.write_line(&format!("An unexpected error occurred: {}", e));
                return;
            }
        };

        if is_exit_command(&line) {
            console.write_line("Agent: Goodbye!");
            return;
        }
        if line.trim().is_empty() {
            continue;
        }

        match session.send_message(line.trim()).await {
            Ok(reply) => console.write_line(&format!("Agent: {}", reply)),
            Err(e) => {
                error!("Chat turn failed: {:?}", e);
                console.write_line(&format!("An unexpected error occurred: {}", e));
                return;
            }
        }
    }
}
