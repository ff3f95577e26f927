use std::sync::Arc;

use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_memory::Memory;

use crate::context::ExecutionContext;
use crate::decision::{loop_risk_section, DecisionCore, Destination, FallbackStrategy};
use crate::router::Router;

const SYSTEM_PROMPT: &str = "You analyze a conversation and route it to the \
next workflow node using the routing criteria. Reply with the destination \
name only.";

/// Conversation-analysis router: the last N turns are weighed against a
/// per-destination routing-criteria table.
pub struct ConversationRouter {
    core: DecisionCore,
    turns: usize,
}

impl ConversationRouter {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            core: DecisionCore::new(model),
            turns: 5,
        }
    }

    /// Declare a destination with the criteria under which the
    /// conversation should route to it.
    pub fn criteria(
        mut self,
        destination: impl Into<String>,
        criteria: impl Into<String>,
    ) -> Self {
        self.core
            .destinations
            .push(Destination::new(destination, criteria));
        self
    }

    /// How many most-recent turns to analyze.
    pub fn with_turns(mut self, turns: usize) -> Self {
        self.turns = turns.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.core.max_retries = max_retries;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.core.fallback = fallback;
        self
    }

    /// Chronological rendering of the last N turns.
    fn render_conversation(&self, memory: &dyn Memory) -> String {
        let items = memory.get(None);
        let start = items.len().saturating_sub(self.turns);
        let lines: Vec<String> = items[start..]
            .iter()
            .map(|item| format!("{}: {}", item.node, item.output_text()))
            .collect();
        if lines.is_empty() {
            "(empty conversation)".to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl Router for ConversationRouter {
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let user = format!(
                "Routing criteria:\n{}\n\n{}Conversation (last {} turns):\n{}\n\nReply with one destination name.",
                self.core.render_destinations(),
                loop_risk_section(ctx),
                self.turns,
                self.render_conversation(memory),
            );
            self.core.decide(SYSTEM_PROMPT.to_string(), user).await
        })
    }

    fn domain(&self) -> Option<Vec<String>> {
        Some(self.core.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arium_memory::WorkflowMemory;
    use arium_test_utils::MockModelClient;

    #[tokio::test]
    async fn test_routes_by_criteria() {
        let model = Arc::new(MockModelClient::always("escalate"));
        let router = ConversationRouter::new(model)
            .criteria("escalate", "the user is frustrated or blocked")
            .criteria("continue", "the conversation is progressing normally");

        let mut mem = WorkflowMemory::new();
        mem.add("input", serde_json::json!("this is the third time I ask!"));
        assert_eq!(router.route(&mem, None).await.unwrap(), "escalate");
    }

    #[test]
    fn test_window_keeps_last_n_turns() {
        let router = ConversationRouter::new(Arc::new(MockModelClient::always("x")))
            .criteria("a", "")
            .with_turns(2);

        let mut mem = WorkflowMemory::new();
        mem.add("input", serde_json::json!("one"));
        mem.add("agent", serde_json::json!("two"));
        mem.add("input", serde_json::json!("three"));

        let convo = router.render_conversation(&mem);
        assert!(!convo.contains("one"));
        assert!(convo.contains("two"));
        assert!(convo.contains("three"));
        // Chronological order inside the window
        assert!(convo.find("two").unwrap() < convo.find("three").unwrap());
    }

    #[test]
    fn test_empty_conversation_placeholder() {
        let router =
            ConversationRouter::new(Arc::new(MockModelClient::always("x"))).criteria("a", "");
        let mem = WorkflowMemory::new();
        assert_eq!(router.render_conversation(&mem), "(empty conversation)");
    }
}
