use std::collections::HashMap;

/// Transient per-step view of the run, recomputed by the engine before
/// each routing decision.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// How many times each node has executed so far.
    pub node_visit_count: HashMap<String, usize>,
    /// Executed node names in order.
    pub execution_path: Vec<String>,
    /// Number of steps taken so far.
    pub iteration_count: usize,
    /// The node whose edge is being consulted.
    pub current_node: String,
}

impl ExecutionContext {
    pub fn visits(&self, node: &str) -> usize {
        self.node_visit_count.get(node).copied().unwrap_or(0)
    }

    /// Render visit counts for model prompts, sorted by name for a stable
    /// rendering.
    pub fn loop_risk(&self) -> String {
        if self.node_visit_count.is_empty() {
            return String::new();
        }
        let mut entries: Vec<(&String, &usize)> = self.node_visit_count.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let counts = entries
            .iter()
            .map(|(node, count)| format!("{}: {}", node, count))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Node visit counts so far ({}). Prefer destinations that have not been visited repeatedly.",
            counts
        )
    }
}
