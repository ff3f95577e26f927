//! Shared test utilities, mocks, and fixtures for Arium crates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use arium_core::error::{AriumError, Result};
use arium_core::traits::{ModelClient, ModelResponse, Tool};
use arium_core::types::Message;

/// Scripted model collaborator for tests.
///
/// Replays a fixed sequence of responses (repeating the last one once the
/// script runs out) and counts invocations.
pub struct MockModelClient {
    responses: Mutex<Vec<String>>,
    cursor: AtomicUsize,
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl MockModelClient {
    /// Always answer with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        Self::sequence(vec![text.into()])
    }

    /// Answer with each text in turn, repeating the last.
    pub fn sequence(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// Fail every call with a model-request error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(vec![]),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail_with: Some(message.into()),
        }
    }

    /// How many times `generate` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelClient for MockModelClient {
    fn generate(&self, _messages: Vec<Message>) -> BoxFuture<'_, Result<ModelResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if let Some(message) = &self.fail_with {
                return Err(AriumError::ModelRequest(message.clone()));
            }
            let responses = self.responses.lock().unwrap();
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
            let text = responses
                .get(idx)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or_default();
            Ok(ModelResponse::text(text))
        })
    }
}

/// Tool that returns a fixed JSON value, recording how often it ran.
pub struct StaticTool {
    name: String,
    output: serde_json::Value,
    calls: AtomicUsize,
}

impl StaticTool {
    pub fn new(name: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            output,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "returns a fixed value"
    }

    fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = self.output.clone();
        Box::pin(async move { Ok(output) })
    }
}
