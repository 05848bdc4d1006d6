use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub conversation: ConversationConfig,
    pub commerce: CommerceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the chat provider's HTTP API; empty runs without delivery.
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub session: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub session_idle_ttl_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub dedup_ttl_secs: u64,
    pub history_limit: usize,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct CommerceConfig {
    pub min_donation: i64,
    pub min_savings_deposit: i64,
    pub nisab_gold_grams: Decimal,
    pub default_gold_price_per_gram: i64,
    pub gold_price_url: Option<String>,
    pub gold_price_json_pointer: String,
    pub gold_price_cache_secs: u64,
    pub qurban_admin_fee: i64,
    pub fidyah_daily_rate: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub gateway_base_url: Option<String>,
    pub server_port: Option<u16>,
    pub min_donation: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: String::new(),
                api_key: None,
                session: "default".to_string(),
                timeout_secs: 15,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                retry_delay_ms: 2_000,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            conversation: ConversationConfig {
                session_idle_ttl_secs: 30 * 60,
                session_sweep_interval_secs: 60,
                dedup_ttl_secs: 30,
                history_limit: 20,
                max_tool_rounds: 5,
            },
            commerce: CommerceConfig {
                min_donation: 10_000,
                min_savings_deposit: 10_000,
                nisab_gold_grams: Decimal::new(85, 0),
                default_gold_price_per_gram: 1_500_000,
                gold_price_url: None,
                gold_price_json_pointer: "/price".to_string(),
                gold_price_cache_secs: 60 * 60,
                qurban_admin_fee: 100_000,
                fidyah_daily_rate: 45_000,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
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
            other => Err(ConfigError::Validation(format!(
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
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("amanah.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            if let Some(base_url) = gateway.base_url {
                self.gateway.base_url = base_url;
            }
            if let Some(gateway_api_key_value) = gateway.api_key {
                self.gateway.api_key = Some(secret_value(gateway_api_key_value));
            }
            if let Some(session) = gateway.session {
                self.gateway.session = session;
            }
            if let Some(timeout_secs) = gateway.timeout_secs {
                self.gateway.timeout_secs = timeout_secs;
            }
        }

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
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_delay_ms) = llm.retry_delay_ms {
                self.llm.retry_delay_ms = retry_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(value) = conversation.session_idle_ttl_secs {
                self.conversation.session_idle_ttl_secs = value;
            }
            if let Some(value) = conversation.session_sweep_interval_secs {
                self.conversation.session_sweep_interval_secs = value;
            }
            if let Some(value) = conversation.dedup_ttl_secs {
                self.conversation.dedup_ttl_secs = value;
            }
            if let Some(value) = conversation.history_limit {
                self.conversation.history_limit = value;
            }
            if let Some(value) = conversation.max_tool_rounds {
                self.conversation.max_tool_rounds = value;
            }
        }

        if let Some(commerce) = patch.commerce {
            if let Some(value) = commerce.min_donation {
                self.commerce.min_donation = value;
            }
            if let Some(value) = commerce.min_savings_deposit {
                self.commerce.min_savings_deposit = value;
            }
            if let Some(value) = commerce.nisab_gold_grams {
                self.commerce.nisab_gold_grams = value;
            }
            if let Some(value) = commerce.default_gold_price_per_gram {
                self.commerce.default_gold_price_per_gram = value;
            }
            if let Some(value) = commerce.gold_price_url {
                self.commerce.gold_price_url = Some(value);
            }
            if let Some(value) = commerce.gold_price_json_pointer {
                self.commerce.gold_price_json_pointer = value;
            }
            if let Some(value) = commerce.gold_price_cache_secs {
                self.commerce.gold_price_cache_secs = value;
            }
            if let Some(value) = commerce.qurban_admin_fee {
                self.commerce.qurban_admin_fee = value;
            }
            if let Some(value) = commerce.fidyah_daily_rate {
                self.commerce.fidyah_daily_rate = value;
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
        if let Some(value) = read_env("AMANAH_GATEWAY_BASE_URL") {
            self.gateway.base_url = value;
        }
        if let Some(value) = read_env("AMANAH_GATEWAY_API_KEY") {
            self.gateway.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AMANAH_GATEWAY_SESSION") {
            self.gateway.session = value;
        }

        if let Some(value) = read_env("AMANAH_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("AMANAH_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AMANAH_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("AMANAH_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AMANAH_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AMANAH_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AMANAH_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("AMANAH_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("AMANAH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AMANAH_SERVER_PORT") {
            self.server.port = parse_u16("AMANAH_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("AMANAH_SESSION_IDLE_TTL_SECS") {
            self.conversation.session_idle_ttl_secs =
                parse_u64("AMANAH_SESSION_IDLE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("AMANAH_DEDUP_TTL_SECS") {
            self.conversation.dedup_ttl_secs = parse_u64("AMANAH_DEDUP_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("AMANAH_MIN_DONATION") {
            self.commerce.min_donation = parse_i64("AMANAH_MIN_DONATION", &value)?;
        }
        if let Some(value) = read_env("AMANAH_GOLD_PRICE_URL") {
            self.commerce.gold_price_url = Some(value);
        }
        if let Some(value) = read_env("AMANAH_DEFAULT_GOLD_PRICE_PER_GRAM") {
            self.commerce.default_gold_price_per_gram =
                parse_i64("AMANAH_DEFAULT_GOLD_PRICE_PER_GRAM", &value)?;
        }

        let log_level = read_env("AMANAH_LOGGING_LEVEL").or_else(|| read_env("AMANAH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AMANAH_LOGGING_FORMAT").or_else(|| read_env("AMANAH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
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
        if let Some(gateway_base_url) = overrides.gateway_base_url {
            self.gateway.base_url = gateway_base_url;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(min_donation) = overrides.min_donation {
            self.commerce.min_donation = min_donation;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_conversation(&self.conversation)?;
        validate_commerce(&self.commerce)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("amanah.toml"), PathBuf::from("config/amanah.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    let base_url = gateway.base_url.trim();
    if !base_url.is_empty() && !base_url.starts_with("http://") && !base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "gateway.base_url must start with http:// or https://".to_string(),
        ));
    }

    if gateway.timeout_secs == 0 || gateway.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.session_idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.session_idle_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if conversation.session_sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.session_sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    if conversation.dedup_ttl_secs == 0 || conversation.dedup_ttl_secs > 600 {
        return Err(ConfigError::Validation(
            "conversation.dedup_ttl_secs must be in range 1..=600".to_string(),
        ));
    }
    if conversation.history_limit == 0 {
        return Err(ConfigError::Validation(
            "conversation.history_limit must be greater than zero".to_string(),
        ));
    }
    if conversation.max_tool_rounds == 0 || conversation.max_tool_rounds > 10 {
        return Err(ConfigError::Validation(
            "conversation.max_tool_rounds must be in range 1..=10".to_string(),
        ));
    }
    Ok(())
}

fn validate_commerce(commerce: &CommerceConfig) -> Result<(), ConfigError> {
    if commerce.min_donation <= 0 || commerce.min_savings_deposit <= 0 {
        return Err(ConfigError::Validation(
            "commerce minimum amounts must be greater than zero".to_string(),
        ));
    }
    if commerce.nisab_gold_grams <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "commerce.nisab_gold_grams must be greater than zero".to_string(),
        ));
    }
    if commerce.default_gold_price_per_gram <= 0 {
        return Err(ConfigError::Validation(
            "commerce.default_gold_price_per_gram must be greater than zero".to_string(),
        ));
    }
    if let Some(url) = &commerce.gold_price_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "commerce.gold_price_url must start with http:// or https://".to_string(),
            ));
        }
    }
    if !commerce.gold_price_json_pointer.starts_with('/') {
        return Err(ConfigError::Validation(
            "commerce.gold_price_json_pointer must be a JSON pointer starting with `/`"
                .to_string(),
        ));
    }
    if commerce.qurban_admin_fee < 0 || commerce.fidyah_daily_rate <= 0 {
        return Err(ConfigError::Validation(
            "commerce.qurban_admin_fee must be non-negative and fidyah_daily_rate positive"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    conversation: Option<ConversationPatch>,
    commerce: Option<CommercePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    session: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    session_idle_ttl_secs: Option<u64>,
    session_sweep_interval_secs: Option<u64>,
    dedup_ttl_secs: Option<u64>,
    history_limit: Option<usize>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CommercePatch {
    min_donation: Option<i64>,
    min_savings_deposit: Option<i64>,
    nisab_gold_grams: Option<Decimal>,
    default_gold_price_per_gram: Option<i64>,
    gold_price_url: Option<String>,
    gold_price_json_pointer: Option<String>,
    gold_price_cache_secs: Option<u64>,
    qurban_admin_fee: Option<i64>,
    fidyah_daily_rate: Option<i64>,
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
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.commerce.min_donation == 10_000, "default minimum donation is 10.000")?;
        ensure(
            config.commerce.gold_price_cache_secs == 3_600,
            "gold price cache defaults to one hour",
        )?;
        ensure(config.commerce.nisab_gold_grams == Decimal::new(85, 0), "nisab is 85 grams")?;
        ensure(matches!(config.llm.provider, LlmProvider::Ollama), "ollama is the default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_AMANAH_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("amanah.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "openai"
api_key = "${TEST_AMANAH_LLM_KEY}"
model = "gpt-4o-mini"

[commerce]
min_donation = 20000
nisab_gold_grams = "85"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(key.as_deref() == Some("sk-from-env"), "api key should come from env")?;
            ensure(config.commerce.min_donation == 20_000, "file should set minimum donation")?;
            Ok(())
        })();

        clear_vars(&["TEST_AMANAH_LLM_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AMANAH_LLM_MODEL", "model-from-env");
        env::set_var("AMANAH_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("amanah.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "env format alias applies")?;
            Ok(())
        })();

        clear_vars(&["AMANAH_LLM_MODEL", "AMANAH_LOG_FORMAT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AMANAH_LLM_PROVIDER", "anthropic");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["AMANAH_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AMANAH_MIN_DONATION", "sepuluh ribu");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected env override failure".to_string())?;
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "AMANAH_MIN_DONATION"),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["AMANAH_MIN_DONATION"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AMANAH_LLM_API_KEY", "sk-secret-value");
        env::set_var("AMANAH_GATEWAY_API_KEY", "gw-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("gw-secret-value"),
                "debug output should not contain gateway key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["AMANAH_LLM_API_KEY", "AMANAH_GATEWAY_API_KEY"]);
        result
    }
}
