use std::sync::Arc;

use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_memory::Memory;

use crate::context::ExecutionContext;
use crate::decision::{loop_risk_section, DecisionCore, Destination, FallbackStrategy};
use crate::router::Router;

const SYSTEM_PROMPT: &str = "You route a reflection workflow. Follow the \
fixed pattern unless the work is clearly finished. Reply with the \
destination name only.";

/// Reflection router: enforces a fixed cyclic visiting pattern
/// (e.g. main → critic → main → final) by tracking per-position visit
/// counts and suggesting the next pattern position to the model.
pub struct ReflectionRouter {
    core: DecisionCore,
    pattern: Vec<String>,
    allow_early_exit: bool,
}

impl ReflectionRouter {
    /// `pattern` is the ordered list of node names one full cycle visits;
    /// the last entry is the exit node.
    pub fn new(model: Arc<dyn ModelClient>, pattern: Vec<String>) -> Self {
        let mut core = DecisionCore::new(model);
        let mut seen: Vec<String> = Vec::new();
        for name in &pattern {
            if !seen.contains(name) {
                seen.push(name.clone());
                let positions: Vec<String> = pattern
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| *n == name)
                    .map(|(i, _)| (i + 1).to_string())
                    .collect();
                core.destinations.push(Destination::new(
                    name,
                    format!("pattern position {}", positions.join(", ")),
                ));
            }
        }
        Self {
            core,
            pattern,
            allow_early_exit: false,
        }
    }

    /// Allow the model to jump straight to the exit node when the work is
    /// already done.
    pub fn with_early_exit(mut self, allowed: bool) -> Self {
        self.allow_early_exit = allowed;
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

    /// The exit node is the pattern's final entry.
    pub fn exit_node(&self) -> Option<&str> {
        self.pattern.last().map(|s| s.as_str())
    }

    /// The next unsatisfied pattern position, given current visit counts.
    ///
    /// Position `i` is satisfied once its node has been visited at least
    /// as many times as it appears in `pattern[..=i]`.
    pub fn suggested_next(&self, ctx: Option<&ExecutionContext>) -> Option<&str> {
        for (i, node) in self.pattern.iter().enumerate() {
            let required = self.pattern[..=i].iter().filter(|n| *n == node).count();
            let visits = ctx.map(|c| c.visits(node)).unwrap_or(0);
            if visits < required {
                return Some(node.as_str());
            }
        }
        self.exit_node()
    }
}

impl Router for ReflectionRouter {
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let suggested = self.suggested_next(ctx).unwrap_or_default().to_string();
            let latest = memory
                .get(None)
                .last()
                .map(|item| item.output_text())
                .unwrap_or_default();

            let early_exit = if self.allow_early_exit {
                format!(
                    "If the latest output already meets the goal, you may exit early to '{}'.\n\n",
                    self.exit_node().unwrap_or_default()
                )
            } else {
                String::new()
            };

            let user = format!(
                "Pattern: {}\nDestinations:\n{}\n\n{}{}Suggested next position: {}\n\nLatest output:\n{}\n\nReply with one destination name.",
                self.pattern.join(" -> "),
                self.core.render_destinations(),
                loop_risk_section(ctx),
                early_exit,
                suggested,
                latest,
            );
            self.core.decide(SYSTEM_PROMPT.to_string(), user).await
        })
    }

    fn domain(&self) -> Option<Vec<String>> {
        Some(self.core.names())
    }

    fn allows_self_reference(&self) -> bool {
        true
    }
}
