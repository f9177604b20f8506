use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use smartquote_core::config::LlmConfig;
use smartquote_core::{AssistGateway, GenerationError, LineItem};
use tracing::{info, warn};

use crate::llm::{build_llm_client, CompletionRequest, LlmClient, LlmError};

/// JSON Schema of the generation answer: an array of line items.
pub fn line_item_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "description": { "type": "string" },
                "quantity": { "type": "number" },
                "unitPrice": { "type": "number" },
            },
            "required": ["description", "quantity", "unitPrice"],
            "additionalProperties": false,
        },
    })
}

fn generation_prompt(request: &str) -> String {
    format!(
        "Génère une liste détaillée d'articles pour un devis professionnel basé sur la demande \
         suivante : \"{request}\".\nCrée des descriptions réalistes, des quantités estimées et \
         des prix unitaires réalistes en euros."
    )
}

fn improvement_prompt(text: &str) -> String {
    format!(
        "Améliore, corrige et rend plus professionnel le texte suivant destiné à la section \
         \"Notes\" ou \"Termes\" d'un devis client : \"{text}\".\nReste concis et courtois."
    )
}

impl From<LlmError> for GenerationError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Request(_) | LlmError::Configuration(_) => Self::Transport(error.to_string()),
            LlmError::Status { .. } => Self::Service(error.to_string()),
            LlmError::Decode(_) => Self::MalformedResponse(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedItem {
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
}

/// Parses a generation answer into line items with fresh ids.
///
/// Accepts a bare array, an `{"items": [...]}` object, and either of those
/// inside a Markdown code fence. Blank text is an empty list.
pub fn parse_line_items(raw: &str) -> Result<Vec<LineItem>, GenerationError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|error| GenerationError::MalformedResponse(error.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(GenerationError::SchemaViolation(
                    "expected an array of line items".to_string(),
                ))
            }
        },
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(GenerationError::SchemaViolation(
                "expected an array of line items".to_string(),
            ))
        }
    };

    let generated: Vec<GeneratedItem> = serde_json::from_value(Value::Array(items))
        .map_err(|error| GenerationError::SchemaViolation(error.to_string()))?;

    generated
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let line = LineItem::new(item.description, item.quantity, item.unit_price);
            match line.checked_line_total() {
                Some(_) => Ok(line),
                None => Err(GenerationError::SchemaViolation(format!(
                    "line item {index}: quantity × unit price exceeds the decimal range"
                ))),
            }
        })
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body).trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// [`AssistGateway`] backed by a generative-language model.
pub struct LlmAssistGateway {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl LlmAssistGateway {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self::new(build_llm_client(config)?, config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AssistGateway for LlmAssistGateway {
    async fn generate_line_items(&self, prompt: &str) -> Result<Vec<LineItem>, GenerationError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: generation_prompt(prompt),
            response_schema: Some(line_item_schema()),
        };

        let answer = self.client.complete(&request).await.map_err(|error| {
            warn!(event_name = "assist.generate.failed", error = %error, "line item generation failed");
            GenerationError::from(error)
        })?;

        let items = match answer {
            Some(text) => parse_line_items(&text)?,
            None => Vec::new(),
        };
        info!(event_name = "assist.generate.completed", items = items.len(), model = %self.model);
        Ok(items)
    }

    async fn improve_text(&self, current_text: &str) -> String {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: improvement_prompt(current_text),
            response_schema: None,
        };

        match self.client.complete(&request).await {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => current_text.to_string(),
            Err(error) => {
                warn!(
                    event_name = "assist.improve.degraded",
                    error = %error,
                    "text improvement failed; keeping original text"
                );
                current_text.to_string()
            }
        }
    }
}
