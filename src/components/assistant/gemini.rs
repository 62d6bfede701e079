use crate::config::Config;
use crate::error::{llm_error, AgentResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

const DEFAULT_TEMPERATURE: f32 = 0.2;

/// One turn of the conversation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// System instruction carries no role
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: String::new(),
            parts: vec![Part::text(text)],
        }
    }

    pub fn function_responses(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.parts
            .iter()
            .filter_map(|part| part.function_call.clone())
            .collect()
    }
}

/// A piece of content; fields the agent does not use are kept so model
/// turns can be echoed back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
                id: None,
            }),
            ..Default::default()
        }
    }

    /// Tool result for `call`, wrapped as `{"result": ...}`
    pub fn function_response(call: &FunctionCall, result: impl Into<String>) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: call.name.clone(),
                response: serde_json::json!({ "result": result.into() }),
                id: call.id.clone(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

/// Body of a generateContent call
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    pub fn new(system_instruction: &str, contents: Vec<Content>, declarations: Vec<Value>) -> Self {
        let tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: declarations,
            }]
        };

        Self {
            system_instruction: Some(Content::instruction(system_instruction)),
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

/// A chat model that can answer with text or function calls
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> AgentResult<Content>;
}

/// Gemini generateContent over REST
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        info!("Using Gemini model: {}", config.gemini_model);
        Self {
            client: Client::new(),
            api_base: config.gemini_api_base.clone(),
            model: config.gemini_model.clone(),
            api_key: config.google_api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> AgentResult<Content> {
        debug!(turns = request.contents.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| llm_error(&format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| llm_error(&format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            return Err(llm_error(&format!(
                "Gemini request failed: HTTP {} - {}",
                status, text
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| llm_error(&format!("Failed to parse Gemini response: {}", e)))?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            llm_error(&format!(
                "Gemini returned no candidates (prompt feedback: {})",
                parsed
                    .prompt_feedback
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "none".to_string())
            ))
        })?;

        let mut content = candidate.content.ok_or_else(|| {
            llm_error(&format!(
                "Gemini candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        if content.role.is_empty() {
            content.role = "model".to_string();
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_part_keeps_unknown_fields() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [{
                "functionCall": {"name": "create_event", "args": {"summary": "Supo"}},
                "thoughtSignature": "c2ln"
            }]
        }))
        .unwrap();

        let calls = content.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "create_event");

        let echoed = serde_json::to_value(&content).unwrap();
        assert_eq!(echoed["parts"][0]["thoughtSignature"], "c2ln");
    }

    #[test]
    fn test_text_joins_parts() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![Part::text("Done. "), Part::text("Anything else?")],
        };
        assert_eq!(content.text(), "Done. Anything else?");
        assert!(content.function_calls().is_empty());
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest::new(
            "be brief",
            vec![Content::user_text("hi")],
            vec![json!({"name": "get_current_datetime", "description": "now"})],
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["systemInstruction"], json!({"parts": [{"text": "be brief"}]}));
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "get_current_datetime"
        );
    }

    #[test]
    fn test_function_response_wraps_result() {
        let call = FunctionCall {
            name: "list_all_calendars".to_string(),
            args: json!({}),
            id: Some("call-1".to_string()),
        };
        let part = Part::function_response(&call, "Accessible Calendars:");
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"functionResponse": {
                "name": "list_all_calendars",
                "response": {"result": "Accessible Calendars:"},
                "id": "call-1"
            }})
        );
    }
}
