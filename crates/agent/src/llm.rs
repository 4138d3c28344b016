use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::ChatMessage;
use crate::tools::ToolSpec;

/// Everything the backend needs to produce the next step of a turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self { call_id: uuid::Uuid::new_v4().to_string(), name: name.into(), input }
    }
}

/// One backend response: streamed text deltas plus any tool calls requested.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStep {
    #[serde(default)]
    pub text_deltas: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
}

impl BackendStep {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text_deltas: vec![text.into()], tool_calls: Vec::new() }
    }

    pub fn tool_calls(tool_calls: Vec<ToolInvocation>) -> Self {
        Self { text_deltas: Vec::new(), tool_calls }
    }

    pub fn joined_text(&self) -> String {
        self.text_deltas.concat()
    }

    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn next_step(&self, request: &CompletionRequest) -> Result<BackendStep>;
}
