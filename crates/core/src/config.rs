use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::quote::DEFAULT_CURRENCY;
use crate::render::TemplateStyle;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["smartquote.toml", "config/smartquote.toml"];
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub editor: EditorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EditorConfig {
    pub default_template: TemplateStyle,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Gemini | Self::OpenAi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub default_template: Option<TemplateStyle>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

/// Why a configuration could not be assembled. Every variant names the key,
/// file or variable to fix.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file `{path}` is unreadable: {source}")]
    UnreadableFile { path: PathBuf, source: std::io::Error },
    #[error("config file `{path}` is not valid TOML for smartquote: {source}")]
    MalformedFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` was required but does not exist")]
    FileNotFound(PathBuf),
    #[error("config file references `${{{var}}}` but that variable is not set")]
    UnsetVariable { var: String },
    #[error("config file has a `${{` placeholder with no closing brace")]
    UnclosedPlaceholder,
    #[error("`{key}` is set to `{value}`, which is not a usable value")]
    BadEnvValue { key: String, value: String },
    #[error("invalid smartquote config: {0}")]
    Invalid(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: DEFAULT_MODEL.to_string(),
                timeout_secs: 30,
            },
            editor: EditorConfig {
                default_template: TemplateStyle::Modern,
                currency: DEFAULT_CURRENCY.to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|value| value.trim_end_matches('/'))
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn api_key_value(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret()).filter(|key| !key.trim().is_empty())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Invalid(format!(
                "unsupported llm provider `{other}` (expected gemini|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = load_file_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::FileNotFound(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(editor) = patch.editor {
            if let Some(default_template) = editor.default_template {
                self.editor.default_template = default_template;
            }
            if let Some(currency) = editor.currency {
                self.editor.currency = currency;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SMARTQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SMARTQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SMARTQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SMARTQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SMARTQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SMARTQUOTE_EDITOR_DEFAULT_TEMPLATE") {
            self.editor.default_template = TemplateStyle::parse_or_fallback(&value);
        }
        if let Some(value) = read_env("SMARTQUOTE_EDITOR_CURRENCY") {
            self.editor.currency = value;
        }

        let log_level =
            read_env("SMARTQUOTE_LOGGING_LEVEL").or_else(|| read_env("SMARTQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SMARTQUOTE_LOGGING_FORMAT").or_else(|| read_env("SMARTQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(default_template) = overrides.default_template {
            self.editor.default_template = default_template;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_editor(&self.editor)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_file_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let owned_path = || path.to_path_buf();
    let text = fs::read_to_string(path)
        .map_err(|source| ConfigError::UnreadableFile { path: owned_path(), source })?;
    let expanded = expand_placeholders(&text)?;

    toml::from_str(&expanded)
        .map_err(|source| ConfigError::MalformedFile { path: owned_path(), source })
}

/// Replaces each `${NAME}` with the value of the environment variable `NAME`.
fn expand_placeholders(text: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnclosedPlaceholder)?;
        let name = &after_open[..end];

        let value =
            env::var(name).map_err(|_| ConfigError::UnsetVariable { var: name.to_string() })?;
        expanded.push_str(&value);
        rest = &after_open[end + 1..];
    }
    expanded.push_str(rest);

    Ok(expanded)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Invalid(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Invalid("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_editor(editor: &EditorConfig) -> Result<(), ConfigError> {
    if editor.currency.chars().count() > 8 {
        return Err(ConfigError::Invalid(
            "editor.currency must be a short display symbol (at most 8 characters)".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Invalid(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::BadEnvValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    editor: Option<EditorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EditorPatch {
    default_template: Option<TemplateStyle>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use crate::render::TemplateStyle;

    use super::{
        expand_placeholders, AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat,
    };

    const SMARTQUOTE_VARS: [&str; 11] = [
        "SMARTQUOTE_LLM_PROVIDER",
        "SMARTQUOTE_LLM_API_KEY",
        "SMARTQUOTE_LLM_BASE_URL",
        "SMARTQUOTE_LLM_MODEL",
        "SMARTQUOTE_LLM_TIMEOUT_SECS",
        "SMARTQUOTE_EDITOR_DEFAULT_TEMPLATE",
        "SMARTQUOTE_EDITOR_CURRENCY",
        "SMARTQUOTE_LOGGING_LEVEL",
        "SMARTQUOTE_LOG_LEVEL",
        "SMARTQUOTE_LOGGING_FORMAT",
        "SMARTQUOTE_LOG_FORMAT",
    ];

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Holds the process environment for one test and puts every variable it
    /// touched back on drop.
    struct ScopedEnv {
        saved: Vec<(String, Option<String>)>,
        _lock: MutexGuard<'static, ()>,
    }

    impl ScopedEnv {
        /// Every `SMARTQUOTE_*` variable starts unset.
        fn clean() -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
            let mut scope = Self { saved: Vec::new(), _lock: lock };
            for var in SMARTQUOTE_VARS {
                scope.unset(var);
            }
            scope
        }

        fn set(&mut self, var: &str, value: &str) -> &mut Self {
            self.remember(var);
            env::set_var(var, value);
            self
        }

        fn unset(&mut self, var: &str) {
            self.remember(var);
            env::remove_var(var);
        }

        fn remember(&mut self, var: &str) {
            if !self.saved.iter().any(|(saved, _)| saved == var) {
                self.saved.push((var.to_string(), env::var(var).ok()));
            }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for (var, previous) in self.saved.drain(..).rev() {
                match previous {
                    Some(value) => env::set_var(&var, value),
                    None => env::remove_var(&var),
                }
            }
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("smartquote.toml");
        fs::write(&path, body).expect("write config file");
        path
    }

    fn load_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let options = LoadOptions { config_path: Some(path.to_path_buf()), ..LoadOptions::default() };
        AppConfig::load(options)
    }

    #[test]
    fn defaults_load_without_file_or_key() {
        let _env = ScopedEnv::clean();

        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");

        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.effective_base_url(), "https://generativelanguage.googleapis.com");
        assert_eq!(config.editor.default_template, TemplateStyle::Modern);
        assert!(matches!(config.logging.format, LogFormat::Compact));
    }

    #[test]
    fn placeholders_in_file_are_filled_from_env() {
        let mut scope = ScopedEnv::clean();
        scope.set("TEST_SMARTQUOTE_KEY", "key-from-env");
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[llm]\napi_key = \"${TEST_SMARTQUOTE_KEY}\"\n\n[editor]\ndefault_template = \"classic\"\n",
        );

        let config = load_file(&path).expect("file loads");

        assert_eq!(config.llm.api_key_value(), Some("key-from-env"));
        assert_eq!(config.editor.default_template, TemplateStyle::Classic);
    }

    #[test]
    fn unset_placeholder_variable_is_named() {
        let mut scope = ScopedEnv::clean();
        scope.unset("TEST_SMARTQUOTE_ABSENT");
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[llm]\napi_key = \"${TEST_SMARTQUOTE_ABSENT}\"\n");

        match load_file(&path) {
            Err(ConfigError::UnsetVariable { var }) => assert_eq!(var, "TEST_SMARTQUOTE_ABSENT"),
            other => panic!("expected an unset variable error, got {other:?}"),
        }
    }

    #[test]
    fn placeholder_expansion_keeps_surrounding_text() {
        let mut scope = ScopedEnv::clean();
        scope.set("TEST_SMARTQUOTE_HOST", "localhost").set("TEST_SMARTQUOTE_PORT", "11434");

        let text = "url = \"http://${TEST_SMARTQUOTE_HOST}:${TEST_SMARTQUOTE_PORT}/\" # $ {x}";
        let expanded = expand_placeholders(text).expect("placeholders expand");

        assert_eq!(expanded, "url = \"http://localhost:11434/\" # $ {x}");
    }

    #[test]
    fn unclosed_placeholder_is_rejected() {
        let _env = ScopedEnv::clean();

        let error = expand_placeholders("api_key = \"${TEST_SMARTQUOTE_KEY\"").unwrap_err();

        assert!(matches!(error, ConfigError::UnclosedPlaceholder));
        assert!(error.to_string().contains("no closing brace"));
    }

    #[test]
    fn required_file_must_exist() {
        let _env = ScopedEnv::clean();
        let dir = TempDir::new().expect("temp dir");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(
            result,
            Err(ConfigError::FileNotFound(path)) if path.ends_with("absent.toml")
        ));
    }

    #[test]
    fn logging_env_aliases_are_supported() {
        let mut scope = ScopedEnv::clean();
        scope.set("SMARTQUOTE_LOG_LEVEL", "warn").set("SMARTQUOTE_LOG_FORMAT", "json");

        let config = AppConfig::load(LoadOptions::default()).expect("config loads");

        assert_eq!(config.logging.level, "warn");
        assert!(matches!(config.logging.format, LogFormat::Json));
    }

    #[test]
    fn precedence_defaults_file_env_overrides() {
        let mut scope = ScopedEnv::clean();
        scope.set("SMARTQUOTE_LLM_MODEL", "model-from-env").set("SMARTQUOTE_LLM_PROVIDER", "ollama");
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            r#"
[llm]
provider = "open_ai"
model = "model-from-file"
timeout_secs = 45

[logging]
level = "warn"
"#,
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                log_level: Some("debug".to_string()),
                default_template: Some(TemplateStyle::Bold),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(config.llm.model, "model-from-env");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.timeout_secs, 45);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.editor.default_template, TemplateStyle::Bold);
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() {
        let mut scope = ScopedEnv::clean();
        scope.set("SMARTQUOTE_LLM_TIMEOUT_SECS", "soon");

        match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::BadEnvValue { key, value }) => {
                assert_eq!(key, "SMARTQUOTE_LLM_TIMEOUT_SECS");
                assert_eq!(value, "soon");
            }
            other => panic!("expected a bad env value error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_base_url_names_the_key() {
        let mut scope = ScopedEnv::clean();
        scope.set("SMARTQUOTE_LLM_BASE_URL", "localhost:11434");

        let error = AppConfig::load(LoadOptions::default()).expect_err("base url without scheme");

        assert!(matches!(
            error,
            ConfigError::Invalid(ref message) if message.contains("llm.base_url")
        ));
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() {
        let mut scope = ScopedEnv::clean();
        scope.set("SMARTQUOTE_LLM_API_KEY", "sk-secret-value");

        let config = AppConfig::load(LoadOptions::default()).expect("config loads");

        assert!(!format!("{config:?}").contains("sk-secret-value"));
        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("sk-secret-value".to_string())
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let mut config = AppConfig::default();
        config.llm.base_url = Some("http://localhost:11434/".to_string());
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434");
    }
}
