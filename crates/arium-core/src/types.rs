use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role in a conversation with a model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message exchanged with a model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Heterogeneous input accepted by a workflow run.
///
/// Memory normalizes each variant into a JSON value recorded under the
/// `"input"` producer name.
#[derive(Debug, Clone)]
pub enum WorkflowInput {
    Text(String),
    Message(Message),
    Value(serde_json::Value),
}

impl WorkflowInput {
    /// Normalize into the JSON value stored in memory.
    pub fn into_value(self) -> serde_json::Value {
        match self {
            WorkflowInput::Text(s) => serde_json::Value::String(s),
            WorkflowInput::Message(m) => serde_json::json!({
                "role": m.role,
                "content": m.content,
            }),
            WorkflowInput::Value(v) => v,
        }
    }

    /// The text carried by this input, for placeholder scanning.
    pub fn text(&self) -> String {
        match self {
            WorkflowInput::Text(s) => s.clone(),
            WorkflowInput::Message(m) => m.content.clone(),
            WorkflowInput::Value(v) => value_to_text(v),
        }
    }
}

impl From<&str> for WorkflowInput {
    fn from(s: &str) -> Self {
        WorkflowInput::Text(s.to_string())
    }
}

impl From<String> for WorkflowInput {
    fn from(s: String) -> Self {
        WorkflowInput::Text(s)
    }
}

impl From<Message> for WorkflowInput {
    fn from(m: Message) -> Self {
        WorkflowInput::Message(m)
    }
}

impl From<serde_json::Value> for WorkflowInput {
    fn from(v: serde_json::Value) -> Self {
        WorkflowInput::Value(v)
    }
}

/// Render a JSON value as plain text for prompts and substitution.
///
/// Strings render without surrounding quotes; everything else uses the
/// compact JSON form.
pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "hello");
        assert!(m.timestamp.is_some());

        let m = Message::system("be brief");
        assert_eq!(m.role, Role::System);
    }

    #[test]
    fn test_input_normalization() {
        let v = WorkflowInput::from("hi").into_value();
        assert_eq!(v, serde_json::json!("hi"));

        let v = WorkflowInput::from(Message::user("hey")).into_value();
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"], "hey");

        let v = WorkflowInput::from(serde_json::json!({"k": 1})).into_value();
        assert_eq!(v["k"], 1);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&serde_json::json!("plain")), "plain");
        assert_eq!(value_to_text(&serde_json::json!(42)), "42");
        assert_eq!(value_to_text(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }
}
