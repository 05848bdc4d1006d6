//! Messages API adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use amanah_core::domain::payment::ImageAttachment;

use super::{
    check_status, http_client, Attempt, CompletionRequest, LlmProvider, ModelTurn, ProviderError,
    RetryPolicy, ToolInvocation, TranscriptItem,
};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
struct Message {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl AnthropicProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        model: &str,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            retry,
        })
    }

    async fn send(
        &self,
        body: &MessagesRequest<'_>,
    ) -> Result<Attempt<MessagesResponse>, ProviderError> {
        let mut request =
            self.client.post(&self.endpoint).header("anthropic-version", API_VERSION).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key.expose_secret());
        }
        match check_status(request.send().await?).await? {
            Attempt::Done(response) => Ok(Attempt::Done(response.json().await?)),
            Attempt::RateLimited => Ok(Attempt::RateLimited),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelTurn, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: &request.system,
            messages: encode_messages(&request.transcript),
            tools: request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect(),
        };

        let response = self.retry.run(self.name(), || self.send(&body)).await?;
        decode_turn(response)
    }
}

fn image_block(image: &ImageAttachment) -> Option<Value> {
    match (&image.data_base64, &image.url) {
        (Some(data), _) => Some(json!({
            "type": "image",
            "source": { "type": "base64", "media_type": image.mime_type, "data": data },
        })),
        (None, Some(url)) => Some(json!({
            "type": "image",
            "source": { "type": "url", "url": url },
        })),
        (None, None) => None,
    }
}

/// Consecutive items with the same role are merged into one message and the
/// conversation always opens with a user turn.
fn encode_messages(transcript: &[TranscriptItem]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    for item in transcript {
        let (role, blocks) = match item {
            TranscriptItem::User { text, image } => {
                let mut blocks = Vec::new();
                if let Some(block) = image.as_ref().and_then(image_block) {
                    blocks.push(block);
                }
                if !text.trim().is_empty() {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
                ("user", blocks)
            }
            TranscriptItem::Assistant(text) if text.trim().is_empty() => continue,
            TranscriptItem::Assistant(text) => {
                ("assistant", vec![json!({ "type": "text", "text": text })])
            }
            TranscriptItem::ToolCall(invocation) => (
                "assistant",
                vec![json!({
                    "type": "tool_use",
                    "id": invocation.id,
                    "name": invocation.name,
                    "input": invocation.arguments,
                })],
            ),
            TranscriptItem::ToolResult { call_id, content, .. } => (
                "user",
                vec![json!({ "type": "tool_result", "tool_use_id": call_id, "content": content })],
            ),
        };
        if blocks.is_empty() {
            continue;
        }
        if messages.is_empty() && role == "assistant" {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(Message { role, content: blocks }),
        }
    }
    messages
}

fn decode_turn(response: MessagesResponse) -> Result<ModelTurn, ProviderError> {
    let mut texts = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = if input.is_null() { json!({}) } else { input };
                return Ok(ModelTurn::ToolCall(ToolInvocation { id, name, arguments }));
            }
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::Other => {}
        }
    }

    let reply = texts.join("\n").trim().to_string();
    if reply.is_empty() {
        return Err(ProviderError::Decode("response had neither text nor tool use".to_string()));
    }
    Ok(ModelTurn::Reply(reply))
}
