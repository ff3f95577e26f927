use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::Message;

/// A single response from a model collaborator.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// The text content of the response.
    pub content: String,
    /// The raw provider payload, when the collaborator keeps one.
    pub raw: Option<serde_json::Value>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            raw: None,
        }
    }
}

/// Model collaborator — a language model backend consumed by agent nodes
/// and model-driven routers. Concrete provider clients live outside this
/// workspace.
pub trait ModelClient: Send + Sync + 'static {
    /// Send a message list and receive a single response.
    fn generate(&self, messages: Vec<Message>) -> BoxFuture<'_, Result<ModelResponse>>;

    /// Extract the decision text from a response.
    fn message_content(&self, response: &ModelResponse) -> String {
        response.content.clone()
    }
}

/// Tool — a callable unit wrapped by a tool node.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (doubles as the default node name).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    /// Execute the tool with given input.
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<serde_json::Value>>;
}
