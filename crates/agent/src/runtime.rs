use std::sync::Arc;

use epicerie_core::cart::CartEngine;
use epicerie_core::config::AssistantConfig;
use tracing::{error, info, warn};

use crate::conversation::{system_instruction, ChatMessage, Conversation, MessagePart};
use crate::llm::{CompletionRequest, LlmClient, ToolInvocation};
use crate::tools::{tool_specs, ToolCall, ToolSettings};

pub const BACKEND_FAILURE_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub tools: ToolSettings,
    pub max_tool_steps: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { tools: ToolSettings::default(), max_tool_steps: 5 }
    }
}

impl From<&AssistantConfig> for RuntimeSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self { tools: ToolSettings::from(config), max_tool_steps: config.max_tool_steps }
    }
}

/// Drives one conversational turn: ask the backend, run the tools it requests
/// against the cart, feed the results back, repeat.
pub struct AssistantRuntime {
    client: Arc<dyn LlmClient>,
    settings: RuntimeSettings,
}

impl AssistantRuntime {
    pub fn new(client: Arc<dyn LlmClient>, settings: RuntimeSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Appends the user message and the assistant reply to `conversation` and
    /// returns the reply. Tool calls are applied to `cart` one at a time, so a
    /// turn dropped mid-way leaves the cart consistent.
    pub async fn handle_user_message(
        &self,
        cart: &mut CartEngine,
        conversation: &mut Conversation,
        text: &str,
    ) -> ChatMessage {
        conversation.push_user(text);

        let system = system_instruction(cart.catalog());
        let tools = tool_specs();
        let mut reply = ChatMessage::assistant("");

        for step_index in 0..self.settings.max_tool_steps {
            let mut messages = conversation.messages().to_vec();
            messages.push(reply.clone());
            let request = CompletionRequest { system: system.clone(), messages, tools: tools.clone() };

            let step = match self.client.next_step(&request).await {
                Ok(step) => step,
                Err(err) => {
                    error!(
                        event_name = "assistant.backend_failed",
                        step = step_index,
                        error = %err,
                        "conversational backend failed"
                    );
                    reply.push_text(BACKEND_FAILURE_REPLY);
                    break;
                }
            };

            for delta in &step.text_deltas {
                reply.push_text(delta);
            }

            if step.is_final() {
                break;
            }

            for invocation in &step.tool_calls {
                self.run_tool(cart, &mut reply, invocation);
            }

            if step_index + 1 == self.settings.max_tool_steps {
                warn!(
                    event_name = "assistant.tool_step_limit",
                    max_tool_steps = self.settings.max_tool_steps,
                    "tool step limit reached; ending turn"
                );
            }
        }

        conversation.push(reply.clone());
        reply
    }

    fn run_tool(&self, cart: &mut CartEngine, reply: &mut ChatMessage, invocation: &ToolInvocation) {
        reply.parts.push(MessagePart::ToolCall {
            call_id: invocation.call_id.clone(),
            tool_name: invocation.name.clone(),
            input: invocation.input.clone(),
        });

        match ToolCall::parse(&invocation.name, invocation.input.clone()) {
            Ok(call) => {
                let tool = call.name();
                let output = call.execute(cart, &self.settings.tools);
                info!(
                    event_name = "assistant.tool_executed",
                    tool = %tool,
                    call_id = %invocation.call_id,
                    mutates_cart = tool.mutates_cart(),
                    "tool call executed"
                );
                reply.parts.push(MessagePart::output_available(
                    &invocation.call_id,
                    &invocation.name,
                    output.to_value(),
                ));
            }
            Err(err) => {
                warn!(
                    event_name = "assistant.tool_rejected",
                    tool = %invocation.name,
                    call_id = %invocation.call_id,
                    error = %err,
                    "tool call rejected"
                );
                reply.parts.push(MessagePart::output_error(
                    &invocation.call_id,
                    &invocation.name,
                    err.to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use epicerie_core::cart::CartEngine;
    use epicerie_core::catalog::Catalog;
    use epicerie_core::domain::product::ItemId;
    use serde_json::json;

    use super::{AssistantRuntime, RuntimeSettings, BACKEND_FAILURE_REPLY};
    use crate::conversation::{Conversation, MessagePart, Role, ToolPartState};
    use crate::llm::{BackendStep, CompletionRequest, LlmClient, ToolInvocation};

    /// Replays canned steps and records every request it sees.
    struct ScriptedBackend {
        steps: Mutex<VecDeque<Result<BackendStep>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn new(steps: Vec<Result<BackendStep>>) -> Arc<Self> {
            Arc::new(Self { steps: Mutex::new(steps.into()), requests: Mutex::new(Vec::new()) })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedBackend {
        async fn next_step(&self, request: &CompletionRequest) -> Result<BackendStep> {
            self.requests.lock().expect("requests lock").push(request.clone());
            self.steps
                .lock()
                .expect("steps lock")
                .pop_front()
                .unwrap_or_else(|| Ok(BackendStep::text("Done.")))
        }
    }

    fn cart() -> CartEngine {
        CartEngine::new(Arc::new(Catalog::builtin().expect("builtin catalog")))
    }

    fn call(name: &str, input: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(name, input)
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_until_the_backend_answers() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendStep::tool_calls(vec![call("addToCart", json!({ "itemId": 4, "quantity": 2 }))])),
            Ok(BackendStep::text("I added two kilos of Gala apples.")),
        ]);
        let runtime = AssistantRuntime::new(backend.clone(), RuntimeSettings::default());
        let mut cart = cart();
        let mut conversation = Conversation::new();

        let reply = runtime.handle_user_message(&mut cart, &mut conversation, "2 apples please").await;

        assert_eq!(cart.quantity(ItemId(4)), 2);
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "I added two kilos of Gala apples.");
        assert_eq!(conversation.len(), 2);

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 6);
        assert!(requests[0].system.contains("Apples Gala"));
        let fed_back = requests[1].messages.last().expect("draft reply is sent back");
        assert_eq!(fed_back.tool_results().count(), 1);
    }

    #[tokio::test]
    async fn malformed_calls_become_error_parts_and_the_turn_continues() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendStep::tool_calls(vec![
                call("addToCart", json!({ "itemId": "four" })),
                call("teleport", json!({})),
                call("addToCart", json!({ "itemId": 7 })),
            ])),
            Ok(BackendStep::text("Added the flour.")),
        ]);
        let runtime = AssistantRuntime::new(backend, RuntimeSettings::default());
        let mut cart = cart();
        let mut conversation = Conversation::new();

        let reply = runtime.handle_user_message(&mut cart, &mut conversation, "flour").await;

        let states = reply
            .parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::ToolResult { state, .. } => Some(*state),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![
                ToolPartState::OutputError,
                ToolPartState::OutputError,
                ToolPartState::OutputAvailable
            ]
        );
        assert_eq!(cart.item_ids(), vec![ItemId(7)]);
        assert_eq!(reply.content, "Added the flour.");
    }

    #[tokio::test]
    async fn backend_failure_yields_apology_and_keeps_applied_tools() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendStep::tool_calls(vec![call("addToCart", json!({ "itemId": 1 }))])),
            Err(anyhow!("upstream timeout")),
        ]);
        let runtime = AssistantRuntime::new(backend, RuntimeSettings::default());
        let mut cart = cart();
        let mut conversation = Conversation::new();

        let reply = runtime.handle_user_message(&mut cart, &mut conversation, "eggs").await;

        assert_eq!(reply.content, BACKEND_FAILURE_REPLY);
        assert_eq!(cart.quantity(ItemId(1)), 1);
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn tool_loop_stops_at_the_step_limit() {
        let looping = (0..10)
            .map(|_| Ok(BackendStep::tool_calls(vec![call("addToCart", json!({ "itemId": 3 }))])))
            .collect();
        let backend = ScriptedBackend::new(looping);
        let settings = RuntimeSettings { max_tool_steps: 3, ..RuntimeSettings::default() };
        let runtime = AssistantRuntime::new(backend.clone(), settings);
        let mut cart = cart();
        let mut conversation = Conversation::new();

        runtime.handle_user_message(&mut cart, &mut conversation, "sugar").await;

        assert_eq!(backend.requests().len(), 3);
        assert_eq!(cart.quantity(ItemId(3)), 3);
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendStep::text("Hello!")),
            Ok(BackendStep::text("Your cart is empty.")),
        ]);
        let runtime = AssistantRuntime::new(backend.clone(), RuntimeSettings::default());
        let mut cart = cart();
        let mut conversation = Conversation::new();

        runtime.handle_user_message(&mut cart, &mut conversation, "hi").await;
        runtime.handle_user_message(&mut cart, &mut conversation, "what's in my cart?").await;

        assert_eq!(conversation.len(), 4);
        let second = &backend.requests()[1];
        assert_eq!(second.messages.len(), 4, "three prior messages plus the empty draft");
    }
}
