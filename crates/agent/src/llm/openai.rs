//! Chat-completions adapter, also used for Ollama's OpenAI-compatible API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    check_status, http_client, image_reference, Attempt, CompletionRequest, LlmProvider,
    ModelTurn, ProviderError, RetryPolicy, ToolInvocation, TranscriptItem,
};

pub struct OpenAiProvider {
    name: &'static str,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

fn function_type() -> String {
    "function".to_string()
}

impl OpenAiProvider {
    pub fn new(
        name: &'static str,
        base_url: &str,
        api_key: Option<SecretString>,
        model: &str,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name,
            client: http_client(timeout_secs)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            retry,
        })
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<Attempt<ChatResponse>, ProviderError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        match check_status(request.send().await?).await? {
            Attempt::Done(response) => Ok(Attempt::Done(response.json().await?)),
            Attempt::RateLimited => Ok(Attempt::RateLimited),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelTurn, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: encode_messages(request),
            tools: request
                .tools
                .iter()
                .map(|tool| ChatTool {
                    tool_type: "function",
                    function: ChatFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        };

        let response = self.retry.run(self.name, || self.send(&body)).await?;
        decode_turn(response)
    }
}

fn encode_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = vec![text_message("system", &request.system)];
    for item in &request.transcript {
        let message = match item {
            TranscriptItem::User { text, image } => {
                let content = match image.as_ref().and_then(image_reference) {
                    Some(url) => json!([
                        { "type": "text", "text": text },
                        { "type": "image_url", "image_url": { "url": url } },
                    ]),
                    None => Value::String(text.clone()),
                };
                ChatMessage {
                    role: "user",
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: None,
                }
            }
            TranscriptItem::Assistant(text) => text_message("assistant", text),
            TranscriptItem::ToolCall(invocation) => ChatMessage {
                role: "assistant",
                content: None,
                tool_calls: Some(vec![ChatToolCall {
                    id: invocation.id.clone(),
                    call_type: function_type(),
                    function: ChatFunctionCall {
                        name: invocation.name.clone(),
                        arguments: invocation.arguments.to_string(),
                    },
                }]),
                tool_call_id: None,
            },
            TranscriptItem::ToolResult { call_id, content, .. } => ChatMessage {
                role: "tool",
                content: Some(Value::String(content.clone())),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        };
        messages.push(message);
    }
    messages
}

fn text_message(role: &'static str, text: &str) -> ChatMessage {
    ChatMessage {
        role,
        content: Some(Value::String(text.to_string())),
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Picks the first tool call, otherwise the text content.
fn decode_turn(response: ChatResponse) -> Result<ModelTurn, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("response carried no choices".to_string()))?;

    let mut calls = choice.message.tool_calls.unwrap_or_default();
    if calls.len() > 1 {
        tracing::debug!(
            event_name = "llm.extra_tool_calls_dropped",
            dropped = calls.len() - 1,
            "only the first tool call of a round is executed"
        );
    }
    if !calls.is_empty() {
        let call = calls.swap_remove(0);
        let arguments =
            serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
        return Ok(ModelTurn::ToolCall(ToolInvocation {
            id: call.id,
            name: call.function.name,
            arguments,
        }));
    }

    match choice.message.content.map(|text| text.trim().to_string()) {
        Some(text) if !text.is_empty() => Ok(ModelTurn::Reply(text)),
        _ => Err(ProviderError::Decode("response had neither content nor tool calls".to_string())),
    }
}
