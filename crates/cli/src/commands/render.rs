use std::fs;
use std::path::PathBuf;

use serde_json::json;
use smartquote_core::config::AppConfig;
use smartquote_core::{EditorError, EditorSession, QuoteRenderer, TemplateStyle};
use tracing::info;

use crate::commands::{load_quote, CommandResult, EXIT_INPUT, EXIT_RENDER};

#[derive(Debug, Clone, Default)]
pub struct RenderArgs {
    pub quote: Option<PathBuf>,
    pub style: Option<String>,
    pub out: Option<PathBuf>,
}

pub fn run(config: &AppConfig, args: RenderArgs) -> CommandResult {
    let quote = match load_quote(args.quote.as_deref(), config) {
        Ok(quote) => quote,
        Err(error) => {
            return CommandResult::failure("render", "quote_input", format!("{error:#}"), EXIT_INPUT)
        }
    };

    let style = args
        .style
        .as_deref()
        .map(TemplateStyle::parse_or_fallback)
        .unwrap_or(config.editor.default_template);
    let session = EditorSession::new(quote).with_template(style);

    let document = match QuoteRenderer::new()
        .map_err(EditorError::from)
        .and_then(|renderer| session.render(&renderer))
    {
        Ok(document) => document,
        Err(error) => {
            return CommandResult::failure("render", "render", error.to_string(), EXIT_RENDER)
        }
    };

    let Some(out) = args.out else {
        return CommandResult::document(document.html);
    };

    if let Err(error) = fs::write(&out, &document.html) {
        return CommandResult::failure(
            "render",
            "output_write",
            format!("could not write `{}`: {error}", out.display()),
            EXIT_INPUT,
        );
    }

    info!(event_name = "cli.render.written", style = %document.style, path = %out.display());
    CommandResult::success_with_data(
        "render",
        format!("rendered {} ({}) to {}", document.title, document.style, out.display()),
        Some(json!({
            "style": document.style,
            "title": document.title,
            "path": out.display().to_string(),
            "totals": session.totals(),
        })),
    )
}
