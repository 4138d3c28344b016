use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use epicerie_core::catalog::Catalog;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tools::ToolName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPartState {
    OutputAvailable,
    OutputError,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        call_id: String,
        tool_name: String,
        state: ToolPartState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_text: Option<String>,
    },
}

impl MessagePart {
    pub fn output_available(call_id: &str, tool_name: &str, output: Value) -> Self {
        Self::ToolResult {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            state: ToolPartState::OutputAvailable,
            output: Some(output),
            error_text: None,
        }
    }

    pub fn output_error(call_id: &str, tool_name: &str, error_text: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            state: ToolPartState::OutputError,
            output: None,
            error_text: Some(error_text.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let parts = if content.is_empty() {
            Vec::new()
        } else {
            vec![MessagePart::Text { text: content.clone() }]
        };
        Self { id: Uuid::new_v4().to_string(), role, content, timestamp: Utc::now(), parts }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Appends streamed text to both the flat content and the trailing text part.
    pub fn push_text(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.content.push_str(delta);
        match self.parts.last_mut() {
            Some(MessagePart::Text { text }) => text.push_str(delta),
            _ => self.parts.push(MessagePart::Text { text: delta.to_string() }),
        }
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &MessagePart> {
        self.parts.iter().filter(|part| matches!(part, MessagePart::ToolResult { .. }))
    }
}

/// Ordered chat history for one shopper.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

pub fn system_instruction(catalog: &Catalog) -> String {
    let mut instruction = String::from(
        "You are a friendly shopping assistant for Epicerie, an online grocery store. \
         Prices are in EUR. Help customers find products and manage their cart.\n\n",
    );

    instruction.push_str("Use the tools instead of describing actions:\n");
    let guidance = [
        (ToolName::AddToCart, "when the customer wants an item; pass the catalog id"),
        (ToolName::RemoveFromCart, "when the customer no longer wants an item"),
        (ToolName::UpdateCartQuantity, "when the customer asks for a specific amount"),
        (ToolName::GetCartInfo, "before answering questions about the cart or its total"),
        (ToolName::ShowProducts, "when the customer browses a category or searches"),
        (ToolName::SuggestMoreOptions, "at the end of a reply to propose next steps"),
    ];
    for (tool, when) in guidance {
        let _ = writeln!(instruction, "- {tool}: {when}");
    }

    instruction.push_str("\nCatalog (id | name | category | price | size):\n");
    for item in catalog.items() {
        let _ = writeln!(
            instruction,
            "{} | {} | {} | {} EUR | {}",
            item.id, item.name, item.category, item.price_eur, item.weight_or_count
        );
    }

    instruction
}
