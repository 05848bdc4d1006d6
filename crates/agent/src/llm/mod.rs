//! Provider-neutral completion interface.
//!
//! The orchestrator only ever sees [`LlmProvider::complete`]: a system prompt,
//! the transcript so far and the tool catalog go in, and either a plain reply
//! or exactly one tool invocation comes back. Each adapter owns its request
//! shape, its image encoding and its rate-limit retry loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use amanah_core::config::{LlmConfig, LlmProvider as ProviderKind};
use amanah_core::domain::payment::ImageAttachment;

use crate::tools::ToolSpec;

pub mod anthropic;
pub mod openai;
mod scripted;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use scripted::ScriptedProvider;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of the conversation as sent to a provider.
#[derive(Clone, Debug, PartialEq)]
pub enum TranscriptItem {
    User { text: String, image: Option<ImageAttachment> },
    Assistant(String),
    ToolCall(ToolInvocation),
    ToolResult { call_id: String, name: String, content: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub transcript: Vec<TranscriptItem>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelTurn {
    Reply(String),
    ToolCall(ToolInvocation),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rate limit persisted after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("provider request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("provider answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("provider request timed out")]
    Timeout,
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelTurn, ProviderError>;
}

/// Fixed-delay retry used by the HTTP adapters for rate-limit answers only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, delay: Duration::from_secs(2) }
    }
}

impl From<&LlmConfig> for RetryPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Outcome of a single HTTP attempt inside [`RetryPolicy::run`].
pub(crate) enum Attempt<T> {
    Done(T),
    RateLimited,
}

impl RetryPolicy {
    pub(crate) async fn run<T, F, Fut>(
        &self,
        provider: &'static str,
        mut attempt: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, ProviderError>>,
    {
        let attempts = self.max_retries + 1;
        for number in 1..=attempts {
            match attempt().await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited if number < attempts => {
                    tracing::warn!(
                        event_name = "llm.rate_limited",
                        provider,
                        attempt = number,
                        delay_ms = self.delay.as_millis() as u64,
                        "provider rate limited the request, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Attempt::RateLimited => break,
            }
        }
        Err(ProviderError::RateLimited { attempts })
    }
}

/// Maps a non-success HTTP answer to an attempt result.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<Attempt<reqwest::Response>, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(Attempt::Done(response));
    }
    if status.as_u16() == 429 {
        return Ok(Attempt::RateLimited);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { status: status.as_u16(), body: truncate(&body, 500) })
}

/// `data:` URI or remote URL for an inbound image, whichever is available.
pub(crate) fn image_reference(image: &ImageAttachment) -> Option<String> {
    match (&image.url, &image.data_base64) {
        (_, Some(data)) => Some(format!("data:{};base64,{data}", image.mime_type)),
        (Some(url), None) => Some(url.clone()),
        (None, None) => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?)
}

/// Builds the adapter named by the configuration.
pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let retry = RetryPolicy::from(config);
    let base_url = config.base_url.as_deref().map(str::trim).filter(|url| !url.is_empty());

    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            "openai",
            base_url.unwrap_or(OPENAI_BASE_URL),
            config.api_key.clone(),
            &config.model,
            config.timeout_secs,
            retry,
        )?),
        ProviderKind::Ollama => {
            let root = base_url.unwrap_or(OLLAMA_BASE_URL).trim_end_matches('/');
            Arc::new(OpenAiProvider::new(
                "ollama",
                &format!("{root}/v1"),
                config.api_key.clone(),
                &config.model,
                config.timeout_secs,
                retry,
            )?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            base_url.unwrap_or(ANTHROPIC_BASE_URL),
            config.api_key.clone(),
            &config.model,
            config.timeout_secs,
            retry,
        )?),
    };

    tracing::info!(
        event_name = "llm.provider_selected",
        provider = provider.name(),
        model = %config.model,
        "llm provider configured"
    );
    Ok(provider)
}
