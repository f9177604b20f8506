use serde_json::json;
use smartquote_agent::LlmAssistGateway;
use smartquote_core::config::AppConfig;
use smartquote_core::AssistGateway;

use crate::commands::{async_runtime, CommandResult, EXIT_ASSIST, EXIT_CONFIG};

#[derive(Debug, Clone, Default)]
pub struct ImproveArgs {
    pub text: String,
}

pub fn run(config: &AppConfig, args: ImproveArgs) -> CommandResult {
    let gateway = match LlmAssistGateway::from_config(&config.llm) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure(
                "improve",
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
                "improve",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_ASSIST,
            )
        }
    };

    runtime.block_on(execute(&args, &gateway))
}

/// Never fails: a degraded answer is the original text with `changed: false`.
pub async fn execute<G>(args: &ImproveArgs, gateway: &G) -> CommandResult
where
    G: AssistGateway + ?Sized,
{
    let improved = gateway.improve_text(&args.text).await;
    let changed = improved != args.text;
    let message = if changed { "text improved" } else { "text unchanged" };

    CommandResult::success_with_data(
        "improve",
        message,
        Some(json!({ "text": improved, "changed": changed })),
    )
}
