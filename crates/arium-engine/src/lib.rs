//! Graph builder, validator, and execution engine for Arium.
//!
//! A workflow is a directed graph of `Node`s (agents, tools, functions,
//! for-each wrappers, nested sub-workflows) connected by `Edge`s, each
//! edge pairing a router with its declared destinations. The `Arium`
//! engine walks the graph from the start sentinel, executing one node at
//! a time, recording outputs to shared append-only memory, and consulting
//! each node's router until it reaches an end sentinel. Cycles are
//! intentional; step and visit ceilings are the correctness backstop.

pub mod builder;
pub mod edge;
pub mod executor;
pub mod metrics;
pub mod node;
pub mod run_log;
pub mod variables;

pub use builder::{
    end_sentinel, AriumBuilder, DEFAULT_STEP_LIMIT, DEFAULT_VISIT_LIMIT, START_SENTINEL,
};
pub use edge::Edge;
pub use executor::Arium;
pub use metrics::WorkflowMetrics;
pub use node::{
    AgentNode, ForEachNode, FunctionNode, Node, NodeFn, NodeKind, NodeOutput, SubflowNode,
    ToolNode, Variables,
};
pub use run_log::RunLogger;
pub use variables::{placeholders, substitute};
