use std::collections::HashMap;

use tracing::debug;

use crate::item::MemoryItem;
use crate::plan_store::PlanStore;

/// Shared append-only run memory.
///
/// The engine is the only writer during a run; nodes and routers read only.
pub trait Memory: Send + Sync {
    /// Record a node output, auto-assigning the per-node occurrence number.
    fn add(&mut self, node: &str, output: serde_json::Value);

    /// Ordered log, optionally filtered to the given producer names.
    fn get(&self, filter: Option<&[String]>) -> Vec<MemoryItem>;

    /// Number of recorded items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty instance of the same kind, for the post-run swap.
    fn fresh(&self) -> Box<dyn Memory>;

    /// The plan extension, when this memory supports execution plans.
    fn as_plan_store(&self) -> Option<&dyn PlanStore> {
        None
    }
}

/// Baseline append-only memory.
#[derive(Debug, Default)]
pub struct WorkflowMemory {
    items: Vec<MemoryItem>,
    counts: HashMap<String, u64>,
}

impl WorkflowMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for WorkflowMemory {
    fn add(&mut self, node: &str, output: serde_json::Value) {
        let count = self.counts.entry(node.to_string()).or_insert(0);
        *count += 1;
        debug!(node, occurrence = *count, "Recording memory item");
        self.items.push(MemoryItem::new(node, *count, output));
    }

    fn get(&self, filter: Option<&[String]>) -> Vec<MemoryItem> {
        match filter {
            Some(names) => self
                .items
                .iter()
                .filter(|i| names.iter().any(|n| n == &i.node))
                .cloned()
                .collect(),
            None => self.items.clone(),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn fresh(&self) -> Box<dyn Memory> {
        Box::new(WorkflowMemory::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut mem = WorkflowMemory::new();
        mem.add("a", serde_json::json!("first"));
        mem.add("b", serde_json::json!("second"));
        mem.add("c", serde_json::json!("third"));

        let items = mem.get(None);
        assert_eq!(items.len(), 3);
        let nodes: Vec<&str> = items.iter().map(|i| i.node.as_str()).collect();
        assert_eq!(nodes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_occurrences_contiguous_from_one() {
        let mut mem = WorkflowMemory::new();
        mem.add("a", serde_json::json!(1));
        mem.add("b", serde_json::json!(2));
        mem.add("a", serde_json::json!(3));
        mem.add("a", serde_json::json!(4));

        let a_items = mem.get(Some(&["a".to_string()]));
        let occurrences: Vec<u64> = a_items.iter().map(|i| i.occurrence).collect();
        assert_eq!(occurrences, vec![1, 2, 3]);

        let b_items = mem.get(Some(&["b".to_string()]));
        assert_eq!(b_items[0].occurrence, 1);
    }

    #[test]
    fn test_filter_keeps_order() {
        let mut mem = WorkflowMemory::new();
        mem.add("a", serde_json::json!(1));
        mem.add("b", serde_json::json!(2));
        mem.add("a", serde_json::json!(3));

        let filtered = mem.get(Some(&["a".to_string(), "b".to_string()]));
        assert_eq!(filtered.len(), 3);
        let filtered = mem.get(Some(&["b".to_string()]));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_fresh_is_empty() {
        let mut mem = WorkflowMemory::new();
        mem.add("a", serde_json::json!(1));
        let fresh = mem.fresh();
        assert!(fresh.is_empty());
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_baseline_has_no_plan_store() {
        let mem = WorkflowMemory::new();
        assert!(mem.as_plan_store().is_none());
    }
}
