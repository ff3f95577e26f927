use serde::{Deserialize, Serialize};

use arium_core::types::value_to_text;

/// Producer name used for initial workflow inputs.
pub const INPUT_NODE: &str = "input";

/// One immutable entry in the append-only run memory.
///
/// Occurrence numbers are 1-based per producer name, strictly increasing
/// and gap-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Name of the node that produced this output.
    pub node: String,
    /// 1-based execution count for this node at the time of recording.
    pub occurrence: u64,
    /// The recorded output.
    pub output: serde_json::Value,
}

impl MemoryItem {
    pub fn new(node: impl Into<String>, occurrence: u64, output: serde_json::Value) -> Self {
        Self {
            node: node.into(),
            occurrence,
            output,
        }
    }

    /// Plain-text rendering of the output, for router prompts.
    pub fn output_text(&self) -> String {
        value_to_text(&self.output)
    }
}
