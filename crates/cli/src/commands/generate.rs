use std::path::PathBuf;

use serde_json::json;
use smartquote_agent::LlmAssistGateway;
use smartquote_core::config::AppConfig;
use smartquote_core::{AssistGateway, EditorSession};

use crate::commands::{
    async_runtime, load_quote, CommandResult, EXIT_ASSIST, EXIT_CONFIG, EXIT_INPUT,
};

#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    pub prompt: String,
    pub quote: Option<PathBuf>,
}

pub fn run(config: &AppConfig, args: GenerateArgs) -> CommandResult {
    let gateway = match LlmAssistGateway::from_config(&config.llm) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure(
                "generate",
                "llm_configuration",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "generate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_ASSIST,
            )
        }
    };

    runtime.block_on(execute(config, &args, &gateway))
}

/// Appends generated items to the loaded quote and reports them with the new
/// totals.
pub async fn execute<G>(config: &AppConfig, args: &GenerateArgs, gateway: &G) -> CommandResult
where
    G: AssistGateway + ?Sized,
{
    let quote = match load_quote(args.quote.as_deref(), config) {
        Ok(quote) => quote,
        Err(error) => {
            return CommandResult::failure(
                "generate",
                "quote_input",
                format!("{error:#}"),
                EXIT_INPUT,
            )
        }
    };

    let mut session = EditorSession::new(quote);
    let ids = match session.generate_items(gateway, &args.prompt).await {
        Ok(ids) => ids,
        Err(error) => {
            return CommandResult::failure(
                "generate",
                "assist_generation",
                format!("{} ({error})", error.user_message()),
                EXIT_ASSIST,
            )
        }
    };

    let added: Vec<_> = session.quote().items.iter().filter(|item| ids.contains(&item.id)).collect();
    let message = if args.prompt.trim().is_empty() {
        "prompt is blank; nothing generated".to_string()
    } else {
        format!("generated {} line item(s)", added.len())
    };

    CommandResult::success_with_data(
        "generate",
        message,
        Some(json!({
            "items": added,
            "totals": session.totals(),
        })),
    )
}
