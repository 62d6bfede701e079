//! Conversation with the model and the calendar tools it may call.

pub mod chat_loop;
pub mod gemini;
pub mod prompt;
pub mod session;
pub mod tools;

pub use chat_loop::{Console, TerminalConsole};
pub use gemini::{GeminiClient, LanguageModel};
pub use session::ChatSession;
pub use tools::{ToolExecutor, ToolInvocation};
