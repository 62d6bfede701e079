use super::gemini::{Content, GenerateRequest, LanguageModel, Part};
use super::tools::{self, ToolExecutor};
use crate::error::{orchestrator_error, AgentResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on model/tool round trips within one user turn
pub const MAX_TOOL_ROUNDS: usize = 8;

/// A conversation with the model, with calendar tools attached
pub struct ChatSession {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolExecutor>,
    system_instruction: String,
    declarations: Vec<Value>,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolExecutor>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            model,
            tools,
            system_instruction: system_instruction.into(),
            declarations: tools::declarations(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Send one user message and drive tool calls until the model answers in text.
    ///
    /// Function calls of a single model turn run in the order given; their
    /// results go back to the model together as one content.
    pub async fn send_message(&mut self, text: &str) -> AgentResult<String> {
        self.history.push(Content::user_text(text));

        for round in 0..=MAX_TOOL_ROUNDS {
            let request = GenerateRequest::new(
                &self.system_instruction,
                self.history.clone(),
                self.declarations.clone(),
            );
            let reply = self.model.generate(&request).await?;
            let calls = reply.function_calls();
            let reply_text = reply.text();
            self.history.push(reply);

            if calls.is_empty() {
                debug!(round, "Model answered with text");
                return Ok(reply_text);
            }

            if round == MAX_TOOL_ROUNDS {
                break;
            }

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                info!(tool = %call.name, round, "Model requested tool");
                let result = tools::dispatch(self.tools.as_ref(), &call.name, &call.args).await;
                responses.push(Part::function_response(call, result));
            }
            self.history.push(Content::function_responses(responses));
        }

        Err(orchestrator_error(&format!(
            "Model kept calling tools after {} rounds",
            MAX_TOOL_ROUNDS
        )))
    }
}
