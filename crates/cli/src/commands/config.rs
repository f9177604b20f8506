use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use smartquote_core::config::{resolve_config_path, AppConfig};
use toml::Value;

const GEMINI_KEY_PREFIX: &str = "AIza";
const MAX_VISIBLE_PREFIX: usize = 4;

pub fn run(config: &AppConfig, explicit_path: Option<&Path>) -> String {
    let config_file_path = resolve_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "llm.provider",
        config.llm.provider.as_str(),
        source("llm.provider", &["SMARTQUOTE_LLM_PROVIDER"]),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        source("llm.model", &["SMARTQUOTE_LLM_MODEL"]),
    ));
    lines.push(render_line(
        "llm.base_url",
        config.llm.effective_base_url(),
        source("llm.base_url", &["SMARTQUOTE_LLM_BASE_URL"]),
    ));
    lines.push(render_line(
        "llm.api_key",
        &redact_secret(config.llm.api_key_value()),
        source("llm.api_key", &["SMARTQUOTE_LLM_API_KEY"]),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", &["SMARTQUOTE_LLM_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "editor.default_template",
        config.editor.default_template.as_str(),
        source("editor.default_template", &["SMARTQUOTE_EDITOR_DEFAULT_TEMPLATE"]),
    ));
    lines.push(render_line(
        "editor.currency",
        &config.editor.currency,
        source("editor.currency", &["SMARTQUOTE_EDITOR_CURRENCY"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["SMARTQUOTE_LOGGING_LEVEL", "SMARTQUOTE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        config.logging.format.as_str(),
        source("logging.format", &["SMARTQUOTE_LOGGING_FORMAT", "SMARTQUOTE_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Shows at most a short vendor prefix (`AIza`, `sk`) and hides the rest.
fn redact_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.map(str::trim) else {
        return "<unset>".to_string();
    };

    if secret.starts_with(GEMINI_KEY_PREFIX) {
        return format!("{GEMINI_KEY_PREFIX}***");
    }
    match secret.split_once('-') {
        Some((prefix, _)) if !prefix.is_empty() && prefix.len() <= MAX_VISIBLE_PREFIX => {
            format!("{prefix}-***")
        }
        _ => "<redacted>".to_string(),
    }
}
