pub mod config;
pub mod generate;
pub mod improve;
pub mod render;

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context};
use serde::Serialize;
use serde_json::Value;
use smartquote_core::config::AppConfig;
use smartquote_core::pricing::checked_totals;
use smartquote_core::QuoteData;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INPUT: u8 = 3;
pub const EXIT_ASSIST: u8 = 4;
pub const EXIT_RENDER: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Raw document output (rendered HTML) rather than a JSON outcome line.
    pub fn document(body: String) -> Self {
        Self { exit_code: 0, output: body }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Reads a JSON quote snapshot, or builds the demo quote in the configured
/// currency when no file is given.
pub fn load_quote(path: Option<&Path>, config: &AppConfig) -> anyhow::Result<QuoteData> {
    let Some(path) = path else {
        let mut quote = QuoteData::default();
        quote.currency = config.editor.currency.clone();
        return Ok(quote);
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read quote file `{}`", path.display()))?;
    let quote: QuoteData = serde_json::from_str(&raw)
        .with_context(|| format!("quote file `{}` is not a valid quote snapshot", path.display()))?;
    ensure!(
        checked_totals(&quote.items, quote.tax_rate).is_some(),
        "quote file `{}` has amounts whose totals exceed the decimal range",
        path.display()
    );
    Ok(quote)
}

fn async_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}
