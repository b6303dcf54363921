use std::env;
use std::fs;
use std::path::Path;

use partsline_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_ERROR};

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_ERROR,
            )
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = redact_secret(config.api.api_key.expose_secret());
    let classifier_key = match &config.classifier.api_key {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    let lines = [
        "effective config (source precedence: flag > env > file > default):".to_string(),
        render_line(
            "api.base_url",
            &config.api.base_url,
            source("api.base_url", &["PARTSLINE_API_BASE_URL", "PARTS_API_BASE_URL"]),
        ),
        render_line(
            "api.api_key",
            &api_key,
            source("api.api_key", &["PARTSLINE_API_KEY", "PARTS_API_KEY"]),
        ),
        render_line(
            "api.timeout_secs",
            &config.api.timeout_secs.to_string(),
            source("api.timeout_secs", &["PARTSLINE_API_TIMEOUT_SECS", "TIMEOUT_SECONDS"]),
        ),
        render_line(
            "api.max_retries",
            &config.api.max_retries.to_string(),
            source("api.max_retries", &["PARTSLINE_API_MAX_RETRIES", "MAX_RETRIES"]),
        ),
        render_line(
            "api.retry_backoff_ms",
            &config.api.retry_backoff_ms.to_string(),
            source("api.retry_backoff_ms", &["PARTSLINE_API_RETRY_BACKOFF_MS"]),
        ),
        render_line(
            "classifier.kind",
            &format!("{:?}", config.classifier.kind),
            source("classifier.kind", &["PARTSLINE_CLASSIFIER_KIND"]),
        ),
        render_line(
            "classifier.provider",
            &format!("{:?}", config.classifier.provider),
            source("classifier.provider", &["PARTSLINE_CLASSIFIER_PROVIDER"]),
        ),
        render_line(
            "classifier.api_key",
            &classifier_key,
            source("classifier.api_key", &["PARTSLINE_CLASSIFIER_API_KEY", "OPENAI_API_KEY"]),
        ),
        render_line(
            "classifier.base_url",
            &config.classifier.base_url,
            source("classifier.base_url", &["PARTSLINE_CLASSIFIER_BASE_URL"]),
        ),
        render_line(
            "classifier.model",
            &config.classifier.model,
            source("classifier.model", &["PARTSLINE_CLASSIFIER_MODEL"]),
        ),
        render_line(
            "classifier.timeout_secs",
            &config.classifier.timeout_secs.to_string(),
            source("classifier.timeout_secs", &["PARTSLINE_CLASSIFIER_TIMEOUT_SECS"]),
        ),
        render_line(
            "conversation.history_limit",
            &config.conversation.history_limit.to_string(),
            source("conversation.history_limit", &["PARTSLINE_CONVERSATION_HISTORY_LIMIT"]),
        ),
        render_line(
            "logging.level",
            &config.logging.level,
            source("logging.level", &["PARTSLINE_LOG_LEVEL", "LOG_LEVEL"]),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", &["PARTSLINE_LOG_FORMAT"]),
        ),
    ];

    CommandResult::text(0, lines.join("\n"))
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
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    "<redacted>".to_string()
}
