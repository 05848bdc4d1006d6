use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use amanah_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, detect_config_path().as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Renders every operator-facing setting with the layer it came from.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key: &str, env_key: Option<&str>| {
        field_source(key, env_key, config_file_doc.as_ref(), config_file_path)
    };

    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("gateway.base_url", or_unset(&config.gateway.base_url), Some("AMANAH_GATEWAY_BASE_URL")),
        (
            "gateway.api_key",
            redact(config.gateway.api_key.as_ref()),
            Some("AMANAH_GATEWAY_API_KEY"),
        ),
        ("gateway.session", config.gateway.session.clone(), Some("AMANAH_GATEWAY_SESSION")),
        ("gateway.timeout_secs", config.gateway.timeout_secs.to_string(), None),
        ("llm.provider", format!("{:?}", config.llm.provider), Some("AMANAH_LLM_PROVIDER")),
        ("llm.model", config.llm.model.clone(), Some("AMANAH_LLM_MODEL")),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            Some("AMANAH_LLM_BASE_URL"),
        ),
        ("llm.api_key", redact(config.llm.api_key.as_ref()), Some("AMANAH_LLM_API_KEY")),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), Some("AMANAH_LLM_TIMEOUT_SECS")),
        ("llm.max_retries", config.llm.max_retries.to_string(), Some("AMANAH_LLM_MAX_RETRIES")),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("AMANAH_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("AMANAH_SERVER_PORT")),
        (
            "conversation.session_idle_ttl_secs",
            config.conversation.session_idle_ttl_secs.to_string(),
            Some("AMANAH_SESSION_IDLE_TTL_SECS"),
        ),
        (
            "conversation.dedup_ttl_secs",
            config.conversation.dedup_ttl_secs.to_string(),
            Some("AMANAH_DEDUP_TTL_SECS"),
        ),
        ("conversation.max_tool_rounds", config.conversation.max_tool_rounds.to_string(), None),
        (
            "commerce.min_donation",
            config.commerce.min_donation.to_string(),
            Some("AMANAH_MIN_DONATION"),
        ),
        ("commerce.nisab_gold_grams", config.commerce.nisab_gold_grams.to_string(), None),
        (
            "commerce.default_gold_price_per_gram",
            config.commerce.default_gold_price_per_gram.to_string(),
            Some("AMANAH_DEFAULT_GOLD_PRICE_PER_GRAM"),
        ),
        (
            "commerce.gold_price_url",
            config.commerce.gold_price_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            Some("AMANAH_GOLD_PRICE_URL"),
        ),
        ("logging.level", config.logging.level.clone(), Some("AMANAH_LOG_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("AMANAH_LOG_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        lines.push(render_line(key, &value, source(key, env_key)));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("amanah.toml"), PathBuf::from("config/amanah.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

/// Keeps a `sk-`/`gw-` style prefix so operators can tell keys apart.
fn redact(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
