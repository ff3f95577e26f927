use std::sync::Arc;

use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_memory::Memory;

use crate::context::ExecutionContext;
use crate::decision::{loop_risk_section, DecisionCore, Destination, FallbackStrategy};
use crate::router::Router;

const SYSTEM_PROMPT: &str = "You classify the latest workflow message into \
exactly one category. Reply with the category name only.";

/// A named category, mapped to one destination node.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub examples: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: vec![],
            examples: vec![],
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }
}

/// Classification router: routes the latest memory output into one of a
/// set of named categories.
pub struct ClassifierRouter {
    core: DecisionCore,
    categories: Vec<Category>,
}

impl ClassifierRouter {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            core: DecisionCore::new(model),
            categories: vec![],
        }
    }

    pub fn category(mut self, category: Category) -> Self {
        self.core
            .destinations
            .push(Destination::new(&category.name, &category.description));
        self.categories.push(category);
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

    fn render_categories(&self) -> String {
        self.categories
            .iter()
            .map(|c| {
                let mut line = format!("- {}: {}", c.name, c.description);
                if !c.keywords.is_empty() {
                    line.push_str(&format!(" (keywords: {})", c.keywords.join(", ")));
                }
                if !c.examples.is_empty() {
                    line.push_str(&format!(" (examples: {})", c.examples.join("; ")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Router for ClassifierRouter {
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let latest = memory
                .get(None)
                .last()
                .map(|item| item.output_text())
                .unwrap_or_default();
            let user = format!(
                "Categories:\n{}\n\n{}Message to classify:\n{}\n\nReply with one category name.",
                self.render_categories(),
                loop_risk_section(ctx),
                latest,
            );
            self.core.decide(SYSTEM_PROMPT.to_string(), user).await
        })
    }

    fn domain(&self) -> Option<Vec<String>> {
        Some(self.core.names())
    }
}
