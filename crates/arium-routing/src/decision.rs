use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_core::types::Message;

use crate::context::ExecutionContext;

/// Deterministic fallback applied once model retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    First,
    Last,
    Random,
}

/// One legal destination of a model-driven router.
#[derive(Debug, Clone)]
pub struct Destination {
    pub name: String,
    pub description: String,
}

impl Destination {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Shared decision core of the model-driven router family.
///
/// Asks the model for a single destination name, matches the answer
/// case-insensitively (exact, then substring), retries up to a bound, and
/// degrades to the fallback strategy on exhaustion. Decision noise is
/// expected here; it never becomes a hard failure.
pub struct DecisionCore {
    model: Arc<dyn ModelClient>,
    pub destinations: Vec<Destination>,
    pub max_retries: usize,
    pub fallback: FallbackStrategy,
}

impl DecisionCore {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            destinations: vec![],
            max_retries: 3,
            fallback: FallbackStrategy::First,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.destinations.iter().map(|d| d.name.clone()).collect()
    }

    /// Render the destination table for prompts.
    pub fn render_destinations(&self) -> String {
        self.destinations
            .iter()
            .map(|d| format!("- {}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ask the model until an answer matches a destination, then fall back.
    pub async fn decide(&self, system: String, user: String) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(user)];

        for attempt in 1..=self.max_retries {
            match self.model.generate(messages.clone()).await {
                Ok(response) => {
                    let answer = self.model.message_content(&response);
                    if let Some(name) = self.match_destination(&answer) {
                        debug!(attempt, decision = %name, "Router decision");
                        return Ok(name);
                    }
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        answer = %answer.trim(),
                        "Router answer matched no destination"
                    );
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Router model call failed"
                    );
                }
            }
        }

        let fallback = self.fallback_destination();
        warn!(decision = %fallback, "Router retries exhausted, using fallback destination");
        Ok(fallback)
    }

    /// Case-insensitive match: exact on the trimmed answer, then substring.
    pub fn match_destination(&self, answer: &str) -> Option<String> {
        let trimmed = answer.trim();
        if let Some(dest) = self
            .destinations
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(trimmed))
        {
            return Some(dest.name.clone());
        }
        let lowered = trimmed.to_lowercase();
        self.destinations
            .iter()
            .find(|d| lowered.contains(&d.name.to_lowercase()))
            .map(|d| d.name.clone())
    }

    pub fn fallback_destination(&self) -> String {
        if self.destinations.is_empty() {
            return String::new();
        }
        match self.fallback {
            FallbackStrategy::First => self.destinations.first(),
            FallbackStrategy::Last => self.destinations.last(),
            FallbackStrategy::Random => {
                let idx = rand::thread_rng().gen_range(0..self.destinations.len());
                self.destinations.get(idx)
            }
        }
        .map(|d| d.name.clone())
        .unwrap_or_default()
    }
}

/// Loop-risk section shared by all model-driven prompts.
pub fn loop_risk_section(ctx: Option<&ExecutionContext>) -> String {
    match ctx {
        Some(ctx) => {
            let risk = ctx.loop_risk();
            if risk.is_empty() {
                String::new()
            } else {
                format!("{}\n\n", risk)
            }
        }
        None => String::new(),
    }
}
