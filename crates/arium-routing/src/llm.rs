use std::sync::Arc;

use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_memory::Memory;

use crate::context::ExecutionContext;
use crate::decision::{loop_risk_section, DecisionCore, Destination, FallbackStrategy};
use crate::router::Router;

/// Approximate characters per model token, used for history budgeting.
const CHARS_PER_TOKEN: usize = 4;

const SYSTEM_PROMPT: &str = "You route a workflow to its next node. \
Read the recent history, then choose exactly one destination. \
Reply with the destination name only.";

/// General model-driven router.
///
/// Builds its prompt from a token-budgeted slice of memory, most recent
/// first, and asks the model for a single destination.
pub struct LlmRouter {
    core: DecisionCore,
    token_budget: usize,
}

impl LlmRouter {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            core: DecisionCore::new(model),
            token_budget: 1000,
        }
    }

    /// Declare a legal destination with its description.
    pub fn destination(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.core
            .destinations
            .push(Destination::new(name, description));
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

    /// History budget in (approximate) tokens.
    pub fn with_token_budget(mut self, tokens: usize) -> Self {
        self.token_budget = tokens;
        self
    }

    /// Most-recent-first history lines, truncated to the token budget.
    fn render_history(&self, memory: &dyn Memory) -> String {
        let budget_chars = self.token_budget * CHARS_PER_TOKEN;
        let mut lines: Vec<String> = Vec::new();
        let mut used = 0;

        for item in memory.get(None).iter().rev() {
            let line = format!("[{} #{}] {}", item.node, item.occurrence, item.output_text());
            if used + line.len() > budget_chars && !lines.is_empty() {
                break;
            }
            used += line.len();
            lines.push(line);
        }

        if lines.is_empty() {
            "(no history yet)".to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl Router for LlmRouter {
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let user = format!(
                "Destinations:\n{}\n\n{}Recent history (most recent first):\n{}\n\nReply with one destination name.",
                self.core.render_destinations(),
                loop_risk_section(ctx),
                self.render_history(memory),
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

    fn memory_with(outputs: &[(&str, &str)]) -> WorkflowMemory {
        let mut mem = WorkflowMemory::new();
        for (node, text) in outputs {
            mem.add(node, serde_json::json!(text));
        }
        mem
    }

    #[tokio::test]
    async fn test_routes_to_model_choice() {
        let model = Arc::new(MockModelClient::always("writer"));
        let router = LlmRouter::new(model)
            .destination("writer", "drafts text")
            .destination("reviewer", "checks text");

        let mem = memory_with(&[("input", "write a poem")]);
        assert_eq!(router.route(&mem, None).await.unwrap(), "writer");
        assert_eq!(
            router.domain(),
            Some(vec!["writer".to_string(), "reviewer".to_string()])
        );
    }

    #[test]
    fn test_history_is_most_recent_first_and_budgeted() {
        let model = Arc::new(MockModelClient::always("x"));
        let router = LlmRouter::new(model)
            .destination("a", "")
            // 10 tokens * 4 chars: enough for roughly one line
            .with_token_budget(10);

        let mem = memory_with(&[("first", "aaaaaaaaaaaaaaaaaaaaaaaa"), ("second", "bbbb")]);
        let history = router.render_history(&mem);
        assert!(history.starts_with("[second #1]"));
        assert!(!history.contains("first"));
    }

    #[test]
    fn test_history_always_includes_latest_item() {
        let model = Arc::new(MockModelClient::always("x"));
        let router = LlmRouter::new(model).destination("a", "").with_token_budget(1);

        let mem = memory_with(&[("n", "a very long line that exceeds the tiny budget easily")]);
        let history = router.render_history(&mem);
        assert!(history.contains("[n #1]"));
    }

    #[tokio::test]
    async fn test_empty_memory_prompt() {
        let model = Arc::new(MockModelClient::always("a"));
        let router = LlmRouter::new(model).destination("a", "only choice");
        let mem = WorkflowMemory::new();
        assert_eq!(router.route(&mem, None).await.unwrap(), "a");
    }
}
