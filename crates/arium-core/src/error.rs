use thiserror::Error;

#[derive(Debug, Error)]
pub enum AriumError {
    // Model collaborator errors
    #[error("Model request failed: {0}")]
    ModelRequest(String),

    #[error("Model response parse error: {0}")]
    ModelParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    // Node errors
    #[error("Node '{node}' failed: {message}")]
    NodeExecution { node: String, message: String },

    // Graph configuration errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Node '{0}' not found in graph")]
    NodeNotFound(String),

    #[error("Router domain mismatch on edge from '{from_node}': router domain {domain:?} vs declared destinations {destinations:?}")]
    RouterDomain {
        from_node: String,
        domain: Vec<String>,
        destinations: Vec<String>,
    },

    // Variable resolution errors
    #[error("Missing variables in initial input: {names:?}")]
    MissingInputVariables { names: Vec<String> },

    #[error("Missing variables in agent prompts: {names:?} (agents: {agents:?})")]
    MissingPromptVariables {
        names: Vec<String>,
        agents: Vec<String>,
    },

    // Traversal errors
    #[error("Router for '{from_node}' returned unknown destination '{returned}' (legal: {destinations:?})")]
    UnknownDestination {
        from_node: String,
        returned: String,
        destinations: Vec<String>,
    },

    #[error("Possible infinite loop: node '{node}' after {steps} steps; path: {path:?}")]
    PossibleInfiniteLoop {
        node: String,
        steps: usize,
        path: Vec<String>,
    },

    // Plan errors
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Plan step not found: {plan}: {step}")]
    PlanStepNotFound { plan: String, step: String },

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AriumError>;
