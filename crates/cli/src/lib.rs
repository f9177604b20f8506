pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use smartquote_core::config::{AppConfig, LoadOptions};

use crate::commands::generate::GenerateArgs;
use crate::commands::improve::ImproveArgs;
use crate::commands::render::RenderArgs;
use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Parser)]
#[command(
    name = "smartquote",
    about = "SmartQuote quote editor CLI",
    long_about = "Render quotes in any layout, draft line items and polish notes with the assistant, and inspect configuration.",
    after_help = "Examples:\n  smartquote render --style classic --out devis.html\n  smartquote generate --prompt \"Site vitrine 5 pages\"\n  smartquote config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a smartquote.toml file (must exist when given)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Render a quote to a printable HTML document")]
    Render {
        #[arg(long, help = "JSON quote snapshot; the demo quote is used when omitted")]
        quote: Option<PathBuf>,
        #[arg(long, help = "Layout: modern, minimalist, classic or bold")]
        style: Option<String>,
        #[arg(long, help = "Write the HTML here instead of stdout")]
        out: Option<PathBuf>,
    },
    #[command(about = "Draft line items from a description and append them to a quote")]
    Generate {
        #[arg(long)]
        prompt: String,
        #[arg(long, help = "JSON quote snapshot; the demo quote is used when omitted")]
        quote: Option<PathBuf>,
    },
    #[command(about = "Rewrite notes or terms text in a professional register")]
    Improve {
        #[arg(long)]
        text: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Render { .. } => "render",
            Self::Generate { .. } => "generate",
            Self::Improve { .. } => "improve",
            Self::Config => "config",
        }
    }
}

pub fn init_logging(config: &AppConfig) {
    use smartquote_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when embedded in tests.
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = dispatch(cli);

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(cli: Cli) -> CommandResult {
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        ..LoadOptions::default()
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                cli.command.name(),
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
        }
    };
    init_logging(&config);

    match cli.command {
        Command::Render { quote, style, out } => {
            commands::render::run(&config, RenderArgs { quote, style, out })
        }
        Command::Generate { prompt, quote } => {
            commands::generate::run(&config, GenerateArgs { prompt, quote })
        }
        Command::Improve { text } => commands::improve::run(&config, ImproveArgs { text }),
        Command::Config => CommandResult {
            exit_code: 0,
            output: commands::config::run(&config, cli.config.as_deref()),
        },
    }
}
