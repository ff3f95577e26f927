use std::collections::HashMap;
use std::sync::Arc;

use arium_core::error::{AriumError, Result};
use arium_core::event::{EventBus, EventKind};
use arium_memory::Memory;
use arium_routing::Router;

use crate::edge::Edge;
use crate::executor::Arium;
use crate::metrics::WorkflowMetrics;
use crate::node::Node;

/// Name of the synthetic start sentinel.
pub const START_SENTINEL: &str = "__start__";

/// Sentinel name for a terminal node's private exit.
pub fn end_sentinel(node: &str) -> String {
    format!("__end__{}", node)
}

/// Default global step ceiling.
pub const DEFAULT_STEP_LIMIT: usize = 20;

/// Default per-node visit ceiling.
pub const DEFAULT_VISIT_LIMIT: usize = 3;

/// Incremental workflow graph builder.
///
/// Register nodes, designate exactly one start and one-or-more ends, and
/// connect nodes with fixed or router-guarded edges. `build` validates
/// the structure and compiles the executable graph; every validation
/// failure is a fatal configuration error raised before any model call.
pub struct AriumBuilder {
    nodes: Vec<Node>,
    starts: Vec<String>,
    ends: Vec<String>,
    edges: Vec<Edge>,
    step_limit: usize,
    visit_limit: usize,
    memory: Option<Box<dyn Memory>>,
    event_bus: Option<Arc<EventBus>>,
    event_filter: Option<Vec<EventKind>>,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl AriumBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            starts: vec![],
            ends: vec![],
            edges: vec![],
            step_limit: DEFAULT_STEP_LIMIT,
            visit_limit: DEFAULT_VISIT_LIMIT,
            memory: None,
            event_bus: None,
            event_filter: None,
            metrics: None,
        }
    }

    /// Register a node. Names must be globally unique.
    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Designate the start node. The builder wraps it with a synthetic
    /// start sentinel and a trivial router.
    pub fn start_with(mut self, name: impl Into<String>) -> Self {
        self.starts.push(name.into());
        self
    }

    /// Designate a terminal node. Each terminal node gets its own end
    /// sentinel, enabling multiple independent exits.
    pub fn end_with(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.ends.contains(&name) {
            self.ends.push(name);
        }
        self
    }

    /// Fixed single-target edge.
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::direct(from, to));
        self
    }

    /// Branching edge with an explicit router and destination set.
    pub fn connect_router(
        mut self,
        from: impl Into<String>,
        targets: Vec<String>,
        router: Arc<dyn Router>,
    ) -> Self {
        self.edges.push(Edge::routed(from, targets, router));
        self
    }

    /// Global step ceiling (default 20).
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Per-node visit ceiling (default 3).
    pub fn with_visit_limit(mut self, limit: usize) -> Self {
        self.visit_limit = limit;
        self
    }

    /// Memory backing the run (default: fresh baseline memory).
    pub fn with_memory(mut self, memory: Box<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Optional event sink for lifecycle events.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Restrict which event kinds are emitted.
    pub fn with_event_filter(mut self, kinds: Vec<EventKind>) -> Self {
        self.event_filter = Some(kinds);
        self
    }

    /// Optional Prometheus metrics.
    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the graph and compile it into an executable workflow.
    pub fn build(self) -> Result<Arium> {
        if self.nodes.is_empty() {
            return Err(AriumError::Config("graph has no nodes".into()));
        }

        let mut nodes: HashMap<String, Node> = HashMap::new();
        for node in self.nodes {
            let name = node.name().to_string();
            if name.is_empty() {
                return Err(AriumError::Config("node name must not be empty".into()));
            }
            if name == START_SENTINEL || name.starts_with("__end__") {
                return Err(AriumError::Config(format!(
                    "node name '{}' is reserved for sentinels",
                    name
                )));
            }
            if nodes.insert(name.clone(), node).is_some() {
                return Err(AriumError::DuplicateNode(name));
            }
        }

        if self.starts.len() != 1 {
            return Err(AriumError::Config(format!(
                "exactly one start node required, got {}",
                self.starts.len()
            )));
        }
        let start = self.starts[0].clone();
        if !nodes.contains_key(&start) {
            return Err(AriumError::NodeNotFound(start));
        }

        if self.ends.is_empty() {
            return Err(AriumError::Config(
                "at least one end node required".into(),
            ));
        }
        for end in &self.ends {
            if !nodes.contains_key(end) {
                return Err(AriumError::NodeNotFound(end.clone()));
            }
        }

        // One outgoing edge per source
        let mut edges: HashMap<String, Edge> = HashMap::new();
        for edge in self.edges {
            if !nodes.contains_key(&edge.source) {
                return Err(AriumError::NodeNotFound(edge.source));
            }
            if edge.targets.is_empty() {
                return Err(AriumError::Config(format!(
                    "edge from '{}' declares no destinations",
                    edge.source
                )));
            }
            let source = edge.source.clone();
            if edges.insert(source.clone(), edge).is_some() {
                return Err(AriumError::Config(format!(
                    "node '{}' already has an outgoing edge",
                    source
                )));
            }
        }

        // A terminal node exits through its sentinel, never through a
        // router.
        for end in &self.ends {
            if edges.contains_key(end) {
                return Err(AriumError::Config(format!(
                    "terminal node '{}' cannot also have an outgoing edge",
                    end
                )));
            }
        }

        // Synthesize sentinels
        nodes.insert(
            START_SENTINEL.to_string(),
            Node::Start {
                name: START_SENTINEL.to_string(),
            },
        );
        edges.insert(
            START_SENTINEL.to_string(),
            Edge::direct(START_SENTINEL, start.clone()),
        );
        for end in &self.ends {
            let sentinel = end_sentinel(end);
            nodes.insert(
                sentinel.clone(),
                Node::End {
                    name: sentinel.clone(),
                },
            );
            edges.insert(end.clone(), Edge::direct(end.clone(), sentinel));
        }

        // Every edge destination must name a registered node
        for edge in edges.values() {
            for target in &edge.targets {
                if !nodes.contains_key(target) {
                    return Err(AriumError::Config(format!(
                        "edge from '{}' targets unknown node '{}'",
                        edge.source, target
                    )));
                }
            }
        }

        // No orphans: every non-sentinel node is a source or destination
        for name in nodes.keys() {
            if name == START_SENTINEL || name.starts_with("__end__") {
                continue;
            }
            let connected = edges.contains_key(name)
                || edges.values().any(|e| e.targets.iter().any(|t| t == name));
            if !connected {
                return Err(AriumError::Config(format!(
                    "orphan node '{}': not connected by any edge",
                    name
                )));
            }
        }

        // Router-domain consistency
        for edge in edges.values() {
            edge.validate_domain()?;
        }

        Ok(Arium::from_parts(
            nodes,
            edges,
            self.step_limit,
            self.visit_limit,
            self.memory
                .unwrap_or_else(|| Box::new(arium_memory::WorkflowMemory::new())),
            self.event_bus,
            self.event_filter,
            self.metrics,
        ))
    }
}

impl Default for AriumBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arium_memory::Memory;
    use arium_routing::{ExecutionContext, FnRouter};

    fn noop(name: &str) -> Node {
        Node::function(name, |_inputs, _vars| async move {
            Ok(serde_json::Value::Null)
        })
    }

    #[test]
    fn test_linear_graph_builds() {
        let graph = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .start_with("a")
            .connect("a", "b")
            .end_with("b")
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_single_node_graph_builds() {
        let graph = AriumBuilder::new()
            .add_node(noop("only"))
            .start_with("only")
            .end_with("only")
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = AriumBuilder::new().build().unwrap_err();
        assert!(matches!(err, AriumError::Config(_)));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("a"))
            .start_with("a")
            .end_with("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn test_missing_start_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .end_with("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(_)));
    }

    #[test]
    fn test_two_starts_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .start_with("a")
            .start_with("b")
            .connect("a", "b")
            .end_with("b")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(_)));
    }

    #[test]
    fn test_missing_end_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .start_with("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(_)));
    }

    #[test]
    fn test_orphan_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("stray"))
            .start_with("a")
            .connect("a", "b")
            .end_with("b")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(message) if message.contains("stray")));
    }

    #[test]
    fn test_unknown_edge_target_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .start_with("a")
            .connect("a", "ghost")
            .end_with("b")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(message) if message.contains("ghost")));
    }

    #[test]
    fn test_terminal_node_with_edge_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .start_with("a")
            .connect("a", "b")
            .connect("b", "a")
            .end_with("b")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(message) if message.contains("terminal")));
    }

    #[test]
    fn test_second_edge_from_same_source_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("c"))
            .start_with("a")
            .connect("a", "b")
            .connect("a", "c")
            .connect("b", "c")
            .end_with("c")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(message) if message.contains("outgoing edge")));
    }

    #[test]
    fn test_router_domain_mismatch_rejected() {
        let router = Arc::new(
            FnRouter::new(|_m: &dyn Memory, _c: Option<&ExecutionContext>| "b".to_string())
                .with_domain(vec!["b".into(), "c".into()]),
        );
        let err = AriumBuilder::new()
            .add_node(noop("a"))
            .add_node(noop("b"))
            .start_with("a")
            .connect_router("a", vec!["b".into()], router)
            .end_with("b")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::RouterDomain { .. }));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let err = AriumBuilder::new()
            .add_node(noop("__start__"))
            .start_with("__start__")
            .end_with("__start__")
            .build()
            .unwrap_err();
        assert!(matches!(err, AriumError::Config(message) if message.contains("reserved")));
    }
}
