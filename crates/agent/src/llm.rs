use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use smartquote_core::config::{LlmConfig, LlmProvider};
use thiserror::Error;
use tracing::debug;

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// JSON Schema for a structured answer. `None` asks for free text.
    pub response_schema: Option<Value>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm service responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
    #[error("llm client is misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the text of the first answer, or `None` when the service
    /// answered without any text.
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, LlmError>;
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| LlmError::Configuration(error.to_string()))?;
    let base_url = config.effective_base_url().to_string();
    let api_key = config.api_key_value().map(|key| SecretString::from(key.to_string()));

    let client: Arc<dyn LlmClient> = match (config.provider, api_key) {
        (provider, None) if provider.requires_api_key() => {
            return Err(LlmError::Configuration(format!(
                "llm.api_key is required for provider `{}` (set SMARTQUOTE_LLM_API_KEY)",
                provider.as_str()
            )));
        }
        (LlmProvider::Gemini, Some(api_key)) => Arc::new(GeminiClient::new(http, base_url, api_key)),
        (_, api_key) => Arc::new(ChatCompletionsClient::new(http, base_url, api_key)),
    };
    Ok(client)
}

async fn post_json(request: RequestBuilder, body: &Value) -> Result<Value, LlmError> {
    let response =
        request.json(body).send().await.map_err(|error| LlmError::Request(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let cut = (0..=ERROR_BODY_LIMIT).rev().find(|idx| body.is_char_boundary(*idx));
            body.truncate(cut.unwrap_or(0));
        }
        return Err(LlmError::Status { status: status.as_u16(), body });
    }

    response.json::<Value>().await.map_err(|error| LlmError::Decode(error.to_string()))
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// Google Generative Language API (`generateContent`).
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { http, base_url: base_url.into(), api_key }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let mut body = json!({ "contents": [{ "parts": [{ "text": request.prompt }] }] });
        if let Some(schema) = &request.response_schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": to_gemini_schema(schema),
            });
        }
        body
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, LlmError> {
        debug!(event_name = "llm.request", provider = "gemini", model = %request.model);
        let builder = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", self.api_key.expose_secret());
        let payload = post_json(builder, &Self::request_body(request)).await?;
        Ok(extract_gemini_text(&payload))
    }
}

fn extract_gemini_text(payload: &Value) -> Option<String> {
    let parts = payload.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts.iter().filter_map(|part| part.get("text")?.as_str()).collect();
    non_empty(text)
}

/// Gemini schemas use upper-case type names and reject `additionalProperties`.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "additionalProperties")
                .map(|(key, value)| {
                    let converted = match (key.as_str(), value) {
                        ("type", Value::String(kind)) => Value::String(kind.to_ascii_uppercase()),
                        _ => to_gemini_schema(value),
                    };
                    (key.clone(), converted)
                })
                .collect(),
        ),
        Value::Array(values) => Value::Array(values.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

/// OpenAI-compatible `/v1/chat/completions`, used for OpenAI and Ollama.
pub struct ChatCompletionsClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl ChatCompletionsClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self { http, base_url: base_url.into(), api_key }
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        // Structured output needs an object root, so arrays travel under `items`.
        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "line_items",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": { "items": schema },
                        "required": ["items"],
                        "additionalProperties": false,
                    },
                },
            });
        }
        body
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, LlmError> {
        debug!(event_name = "llm.request", provider = "chat_completions", model = %request.model);
        let mut builder = self.http.post(format!("{}/v1/chat/completions", self.base_url));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }
        let payload = post_json(builder, &Self::request_body(request)).await?;
        Ok(extract_chat_text(&payload))
    }
}

fn extract_chat_text(payload: &Value) -> Option<String> {
    let content = payload.pointer("/choices/0/message/content")?.as_str()?;
    non_empty(content.to_string())
}
