//! OpenAI-compatible generator.
//!
//! Works with any service implementing the chat completions API with
//! JSON response format.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{prompts, GenerateError, GenerationRequest, Generator};

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Bearer token. Required at request time.
    pub api_key: Option<String>,

    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub model: String,

    /// Whole-request timeout
    pub timeout: Duration,

    /// Name of the environment variable the key came from, for error messages
    pub api_key_env: String,
}

pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerateError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn build_payload(&self, request: &GenerationRequest) -> Result<ChatRequest, GenerateError> {
        let inputs = serde_json::to_string_pretty(&request.inputs)?;

        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(prompts::system_prompt(request.task)),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(inputs),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.2,
        })
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerateError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerateError::MissingApiKey(self.config.api_key_env.clone()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let payload = self.build_payload(request)?;

        debug!(
            "Sending {} request to {} (model {})",
            request.task, url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json()?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GenerateError::EmptyResponse)?;

        parse_content(&content)
    }
}

/// Parses the assistant message as a JSON object, tolerating a Markdown fence.
fn parse_content(content: &str) -> Result<Value, GenerateError> {
    let body = crate::execution::script::strip_code_fence(content);
    if body.trim().is_empty() {
        return Err(GenerateError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(&body)?;
    if !value.is_object() {
        return Err(GenerateError::NotAnObject);
    }
    Ok(value)
}
