//! Assistant side of the store: the cart tool contract and the loop that lets a
//! conversational backend drive it.
//!
//! The backend only ever translates intent into tool calls. Prices, names and
//! totals always come from the catalog and the cart engine.

pub mod conversation;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use conversation::{system_instruction, ChatMessage, Conversation, MessagePart, Role};
pub use llm::{BackendStep, CompletionRequest, LlmClient, ToolInvocation};
pub use runtime::{AssistantRuntime, RuntimeSettings, BACKEND_FAILURE_REPLY};
pub use tools::{dispatch, tool_specs, ToolCall, ToolError, ToolName, ToolOutput, ToolSettings};
