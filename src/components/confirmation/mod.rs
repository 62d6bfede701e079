//! Human approval before any calendar change takes effect.

use inquire::{InquireError, Text};
use tracing::{debug, warn};

/// Result message returned when the operator declines an action
pub const CANCELLED_MESSAGE: &str = "Action cancelled by user.";

/// Prompt shown after the action description
pub const CONFIRM_PROMPT: &str = "Confirm action? (y/n):";

/// Blocks until the operator approves or declines an action
pub trait ConfirmationGate: Send + Sync {
    /// Render `description` and return whether the action may proceed
    fn confirm(&self, description: &str) -> bool;
}

/// Approval policy: any answer starting with "n" ("n", "no", "nope", "not now")
/// declines, everything else approves, so empty input approves
pub fn answer_approves(answer: &str) -> bool {
    !answer.trim().to_lowercase().starts_with('n')
}

/// Turn a prompt outcome into a decision plus a notice for the operator when
/// no answer could be read
fn settle(answer: Result<String, InquireError>) -> (bool, Option<String>) {
    match answer {
        Ok(answer) => {
            let approved = answer_approves(&answer);
            debug!(approved, "Confirmation answered");
            (approved, None)
        }
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
            debug!("Confirmation prompt interrupted, treating as declined");
            (false, Some("Confirmation cancelled. Action not performed.".to_string()))
        }
        Err(e) => {
            warn!("Confirmation prompt failed: {}", e);
            (
                false,
                Some(format!(
                    "Could not read a confirmation answer ({}). Action not performed.",
                    e
                )),
            )
        }
    }
}

/// Interactive gate on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleGate;

impl ConfirmationGate for ConsoleGate {
    fn confirm(&self, description: &str) -> bool {
        println!("{}", description);

        let (approved, notice) = settle(Text::new(CONFIRM_PROMPT).prompt());
        if let Some(notice) = notice {
            println!("{}", notice);
        }
        approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negatives_decline() {
        for answer in ["n", "N", "no", "No", "NO", " n ", "no\n", "nope", "Nah", "not sure"] {
            assert!(!answer_approves(answer), "{:?} should decline", answer);
        }
    }

    #[test]
    fn test_everything_else_approves() {
        for answer in ["", "  ", "y", "Y", "yes", "ok", "sure", "0"] {
            assert!(answer_approves(answer), "{:?} should approve", answer);
        }
    }

    #[test]
    fn test_unreadable_prompt_declines_with_notice() {
        let (approved, notice) = settle(Err(InquireError::NotTTY));
        assert!(!approved);
        let notice = notice.unwrap();
        assert!(notice.starts_with("Could not read a confirmation answer"), "{}", notice);
        assert!(notice.ends_with("Action not performed."));
    }

    #[test]
    fn test_cancelled_prompt_declines_with_notice() {
        let (approved, notice) = settle(Err(InquireError::OperationCanceled));
        assert!(!approved);
        assert_eq!(notice.as_deref(), Some("Confirmation cancelled. Action not performed."));
    }

    #[test]
    fn test_answered_prompt_has_no_notice() {
        assert_eq!(settle(Ok(String::new())), (true, None));
        assert_eq!(settle(Ok("nope".to_string())), (false, None));
    }
}
