use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{CompletionRequest, LlmProvider, ModelTurn, ProviderError, ToolInvocation};

/// Replays queued turns in order and keeps every request it was sent.
/// An exhausted script answers with a decode error.
#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Result<ModelTurn, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    next_call: Mutex<u32>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_reply(&self, text: &str) {
        self.turns.lock().await.push_back(Ok(ModelTurn::Reply(text.to_string())));
    }

    pub async fn push_tool(&self, name: &str, arguments: Value) {
        let id = {
            let mut next_call = self.next_call.lock().await;
            *next_call += 1;
            format!("call_{next_call}")
        };
        self.turns.lock().await.push_back(Ok(ModelTurn::ToolCall(ToolInvocation {
            id,
            name: name.to_string(),
            arguments,
        })));
    }

    pub async fn push_error(&self, error: ProviderError) {
        self.turns.lock().await.push_back(Err(error));
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.turns.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelTurn, ProviderError> {
        self.requests.lock().await.push(request.clone());
        self.turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Decode("script exhausted".to_string())))
    }
}
