use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_core::traits::{ModelClient, Tool};
use arium_core::types::{value_to_text, Message, WorkflowInput};

use crate::executor::Arium;
use crate::variables::substitute;

/// Variable substitution mapping passed to node executions.
pub type Variables = HashMap<String, serde_json::Value>;

/// Result of one node execution.
///
/// Most nodes yield a single value; a for-each node yields one value per
/// element. When recording to memory, a multi-output result collapses to
/// its last item (the single-successor-edge model keeps one output per
/// step; earlier items are not retrievable afterwards).
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    Single(serde_json::Value),
    Many(Vec<serde_json::Value>),
}

impl NodeOutput {
    /// The value recorded to memory.
    pub fn into_recorded(self) -> serde_json::Value {
        match self {
            NodeOutput::Single(value) => value,
            NodeOutput::Many(mut items) => items.pop().unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Capability tag, used only for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Agent,
    Tool,
    Function,
    ForEach,
    Subflow,
    Start,
    End,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Agent => "agent",
            NodeKind::Tool => "tool",
            NodeKind::Function => "function",
            NodeKind::ForEach => "for_each",
            NodeKind::Subflow => "subflow",
            NodeKind::Start => "start",
            NodeKind::End => "end",
        }
    }
}

/// A model-backed agent node.
///
/// The prompt may contain `{placeholders}`; the engine substitutes them
/// exactly once before the first step, so `run` receives an empty
/// variable mapping and never re-substitutes.
pub struct AgentNode {
    pub name: String,
    prompt: String,
    resolved_prompt: Option<String>,
    model: Arc<dyn ModelClient>,
    input_filter: Option<Vec<String>>,
}

impl AgentNode {
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            resolved_prompt: None,
            model,
            input_filter: None,
        }
    }

    pub fn with_input_filter(mut self, producers: Vec<String>) -> Self {
        self.input_filter = Some(producers);
        self
    }

    /// The static prompt template, as configured.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub(crate) fn resolve_prompt(&mut self, variables: &Variables) {
        self.resolved_prompt = Some(substitute(&self.prompt, variables));
    }

    fn effective_prompt(&self) -> &str {
        self.resolved_prompt.as_deref().unwrap_or(&self.prompt)
    }

    async fn run(&self, inputs: Vec<serde_json::Value>) -> Result<serde_json::Value> {
        let mut messages = vec![Message::system(self.effective_prompt())];
        for input in &inputs {
            messages.push(Message::user(value_to_text(input)));
        }
        let response = self.model.generate(messages).await?;
        Ok(serde_json::Value::String(
            self.model.message_content(&response),
        ))
    }
}

/// A callable-tool node.
pub struct ToolNode {
    pub name: String,
    tool: Arc<dyn Tool>,
    input_filter: Option<Vec<String>>,
}

impl ToolNode {
    /// Node name defaults to the tool's own name.
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            tool,
            input_filter: None,
        }
    }

    pub fn named(name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        Self {
            name: name.into(),
            tool,
            input_filter: None,
        }
    }

    pub fn with_input_filter(mut self, producers: Vec<String>) -> Self {
        self.input_filter = Some(producers);
        self
    }

    async fn run(
        &self,
        inputs: Vec<serde_json::Value>,
        variables: &Variables,
    ) -> Result<serde_json::Value> {
        let input = serde_json::json!({
            "inputs": inputs,
            "variables": variables,
        });
        self.tool.execute(input).await
    }
}

/// Boxed async handler backing a function node.
pub type NodeFn = Arc<
    dyn Fn(Vec<serde_json::Value>, Variables) -> BoxFuture<'static, Result<serde_json::Value>>
        + Send
        + Sync,
>;

/// A plain-function node.
pub struct FunctionNode {
    pub name: String,
    handler: NodeFn,
    input_filter: Option<Vec<String>>,
}

impl FunctionNode {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>, Variables) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |inputs, variables| Box::pin(f(inputs, variables))),
            input_filter: None,
        }
    }

    pub fn with_input_filter(mut self, producers: Vec<String>) -> Self {
        self.input_filter = Some(producers);
        self
    }
}

/// Applies an inner node element-wise over its latest input.
pub struct ForEachNode {
    pub name: String,
    inner: Box<Node>,
    input_filter: Option<Vec<String>>,
}

impl ForEachNode {
    pub fn new(name: impl Into<String>, inner: Node) -> Self {
        Self {
            name: name.into(),
            inner: Box::new(inner),
            input_filter: None,
        }
    }

    pub fn with_input_filter(mut self, producers: Vec<String>) -> Self {
        self.input_filter = Some(producers);
        self
    }

    async fn run(
        &self,
        inputs: Vec<serde_json::Value>,
        variables: &Variables,
    ) -> Result<NodeOutput> {
        let elements = match inputs.last() {
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => vec![],
        };
        let mut results = Vec::with_capacity(elements.len());
        for element in elements {
            let output = self.inner.run(vec![element], variables).await?;
            results.push(output.into_recorded());
        }
        Ok(NodeOutput::Many(results))
    }
}

/// A nested compiled workflow run as a single node.
pub struct SubflowNode {
    pub name: String,
    flow: tokio::sync::Mutex<Arium>,
    input_filter: Option<Vec<String>>,
}

impl SubflowNode {
    pub fn new(name: impl Into<String>, flow: Arium) -> Self {
        Self {
            name: name.into(),
            flow: tokio::sync::Mutex::new(flow),
            input_filter: None,
        }
    }

    pub fn with_input_filter(mut self, producers: Vec<String>) -> Self {
        self.input_filter = Some(producers);
        self
    }

    async fn run(
        &self,
        inputs: Vec<serde_json::Value>,
        variables: &Variables,
    ) -> Result<serde_json::Value> {
        let sub_inputs: Vec<WorkflowInput> =
            inputs.into_iter().map(WorkflowInput::Value).collect();
        let mut flow = self.flow.lock().await;
        let items = flow.run(sub_inputs, variables.clone()).await?;
        Ok(items
            .last()
            .map(|item| item.output.clone())
            .unwrap_or(serde_json::Value::Null))
    }
}

/// A node in the workflow graph: a closed union over every executable
/// unit plus the Start/End sentinels.
pub enum Node {
    Agent(AgentNode),
    Tool(ToolNode),
    Function(FunctionNode),
    ForEach(ForEachNode),
    Subflow(SubflowNode),
    Start { name: String },
    End { name: String },
}

impl Node {
    pub fn agent(
        name: impl Into<String>,
        prompt: impl Into<String>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Node::Agent(AgentNode::new(name, prompt, model))
    }

    pub fn tool(tool: Arc<dyn Tool>) -> Self {
        Node::Tool(ToolNode::new(tool))
    }

    pub fn function<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>, Variables) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Node::Function(FunctionNode::new(name, f))
    }

    pub fn for_each(name: impl Into<String>, inner: Node) -> Self {
        Node::ForEach(ForEachNode::new(name, inner))
    }

    pub fn subflow(name: impl Into<String>, flow: Arium) -> Self {
        Node::Subflow(SubflowNode::new(name, flow))
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Agent(n) => &n.name,
            Node::Tool(n) => &n.name,
            Node::Function(n) => &n.name,
            Node::ForEach(n) => &n.name,
            Node::Subflow(n) => &n.name,
            Node::Start { name } | Node::End { name } => name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Agent(_) => NodeKind::Agent,
            Node::Tool(_) => NodeKind::Tool,
            Node::Function(_) => NodeKind::Function,
            Node::ForEach(_) => NodeKind::ForEach,
            Node::Subflow(_) => NodeKind::Subflow,
            Node::Start { .. } => NodeKind::Start,
            Node::End { .. } => NodeKind::End,
        }
    }

    pub fn input_filter(&self) -> Option<&[String]> {
        match self {
            Node::Agent(n) => n.input_filter.as_deref(),
            Node::Tool(n) => n.input_filter.as_deref(),
            Node::Function(n) => n.input_filter.as_deref(),
            Node::ForEach(n) => n.input_filter.as_deref(),
            Node::Subflow(n) => n.input_filter.as_deref(),
            Node::Start { .. } | Node::End { .. } => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Node::Start { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Node::End { .. })
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Node::Agent(_))
    }

    /// The static prompt carried by agent variants, for variable scanning.
    pub fn static_prompt(&self) -> Option<&str> {
        match self {
            Node::Agent(n) => Some(n.prompt()),
            _ => None,
        }
    }

    /// Substitute variables into an agent's prompt, once, before the run.
    pub(crate) fn resolve_prompt(&mut self, variables: &Variables) {
        if let Node::Agent(n) = self {
            n.resolve_prompt(variables);
        }
    }

    /// Execute this node. Sentinels have no behavior and yield null.
    pub fn run<'a>(
        &'a self,
        inputs: Vec<serde_json::Value>,
        variables: &'a Variables,
    ) -> BoxFuture<'a, Result<NodeOutput>> {
        Box::pin(async move {
            match self {
                Node::Agent(n) => n.run(inputs).await.map(NodeOutput::Single),
                Node::Tool(n) => n.run(inputs, variables).await.map(NodeOutput::Single),
                Node::Function(n) => (n.handler)(inputs, variables.clone())
                    .await
                    .map(NodeOutput::Single),
                Node::ForEach(n) => n.run(inputs, variables).await,
                Node::Subflow(n) => n.run(inputs, variables).await.map(NodeOutput::Single),
                Node::Start { .. } | Node::End { .. } => {
                    Ok(NodeOutput::Single(serde_json::Value::Null))
                }
            }
        })
    }
}
