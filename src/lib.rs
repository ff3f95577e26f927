//! Arium — a workflow execution engine.
//!
//! Composes heterogeneous execution units (model-backed agents, callable
//! tools, plain functions, nested sub-workflows) into a directed graph
//! and runs it to completion, resolving control flow dynamically via
//! pluggable routing, backed by shared append-only memory, with
//! loop-prevention ceilings and plan-aware multi-step execution.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use arium::{AriumBuilder, Node};
//!
//! # async fn demo() -> arium::Result<()> {
//! let mut flow = AriumBuilder::new()
//!     .add_node(Node::function("shout", |inputs, _vars| async move {
//!         let text = inputs
//!             .last()
//!             .and_then(|v| v.as_str())
//!             .unwrap_or_default()
//!             .to_uppercase();
//!         Ok(serde_json::Value::String(text))
//!     }))
//!     .start_with("shout")
//!     .end_with("shout")
//!     .build()?;
//!
//! let log = flow.run(vec!["hello".into()], HashMap::new()).await?;
//! assert_eq!(log.last().unwrap().output, serde_json::json!("HELLO"));
//! # Ok(())
//! # }
//! ```

pub use arium_core::{
    value_to_text, AriumError, EventBus, EventKind, Message, ModelClient, ModelResponse, Result,
    Role, Tool, WorkflowEvent, WorkflowInput,
};
pub use arium_engine::{
    end_sentinel, AgentNode, Arium, AriumBuilder, Edge, ForEachNode, FunctionNode, Node, NodeKind,
    NodeOutput, RunLogger, SubflowNode, ToolNode, Variables, WorkflowMetrics, DEFAULT_STEP_LIMIT,
    DEFAULT_VISIT_LIMIT, START_SENTINEL,
};
pub use arium_memory::{
    ExecutionPlan, Memory, MemoryItem, PlanAwareMemory, PlanStatus, PlanStep, PlanStore,
    StepStatus, WorkflowMemory, INPUT_NODE,
};
pub use arium_routing::{
    Category, ClassifierRouter, ConversationRouter, ExecutionContext, FallbackStrategy, FnRouter,
    LlmRouter, PlanExecuteRouter, ReflectionRouter, Router, StaticRouter,
};
