//! Append-only run memory and execution plans for Arium.
//!
//! Memory is per-run mutable shared state: an ordered log of
//! `{producer node, occurrence, output}` records, filterable by producer
//! name. The plan-aware variant additionally stores named execution plans
//! with dependency-gated steps for plan-execute routing.

pub mod item;
pub mod plan;
pub mod plan_store;
pub mod store;

pub use item::{MemoryItem, INPUT_NODE};
pub use plan::{ExecutionPlan, PlanStatus, PlanStep, StepStatus};
pub use plan_store::{extract_plan, PlanAwareMemory, PlanStore};
pub use store::{Memory, WorkflowMemory};
