use std::collections::HashMap;

use tracing::{debug, info, warn};

use arium_core::error::{AriumError, Result};

use crate::item::MemoryItem;
use crate::plan::{ExecutionPlan, StepStatus};
use crate::store::{Memory, WorkflowMemory};

/// Read-only plan access exposed to routers.
pub trait PlanStore {
    /// The plan most recently added to this run, if any.
    fn current_plan(&self) -> Option<ExecutionPlan>;

    /// Look up any plan added during this run by id.
    fn plan(&self, id: &str) -> Option<ExecutionPlan>;
}

/// Memory variant that also stores named execution plans.
///
/// The engine stays the sole memory writer: plan documents found in node
/// output are ingested on `add`, and an output produced by the agent
/// assigned to the current plan's active step records that step's result.
/// `update_plan` / `update_step_status` remain available for explicit
/// transitions between runs and in tests.
#[derive(Debug, Default)]
pub struct PlanAwareMemory {
    base: WorkflowMemory,
    plans: HashMap<String, ExecutionPlan>,
    current: Option<String>,
}

impl PlanAwareMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plan; it becomes the current plan. Older plans remain
    /// retrievable by id.
    pub fn add_plan(&mut self, mut plan: ExecutionPlan) {
        plan.refresh_status();
        info!(plan_id = %plan.id, title = %plan.title, steps = plan.steps.len(), "Plan added");
        self.current = Some(plan.id.clone());
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Replace a stored plan wholesale.
    pub fn update_plan(&mut self, mut plan: ExecutionPlan) -> Result<()> {
        if !self.plans.contains_key(&plan.id) {
            return Err(AriumError::PlanNotFound(plan.id));
        }
        plan.refresh_status();
        self.plans.insert(plan.id.clone(), plan);
        Ok(())
    }

    /// Explicit status transition for one step.
    pub fn update_step_status(
        &mut self,
        plan_id: &str,
        step_id: &str,
        status: StepStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<()> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| AriumError::PlanNotFound(plan_id.to_string()))?;
        let step = plan
            .step_mut(step_id)
            .ok_or_else(|| AriumError::PlanStepNotFound {
                plan: plan_id.to_string(),
                step: step_id.to_string(),
            })?;
        step.status = status;
        step.result = result;
        step.error = error;
        plan.refresh_status();
        Ok(())
    }

    /// Record a node output against the current plan's active step, when
    /// the node is the agent assigned to it.
    fn record_step_output(&mut self, node: &str, output: &serde_json::Value) {
        let Some(current_id) = self.current.clone() else {
            return;
        };
        let Some(plan) = self.plans.get_mut(&current_id) else {
            return;
        };

        // Prefer an in-progress step for this agent, then a failed one
        // being recovered, then the first eligible pending one.
        let step_id = plan
            .in_progress_steps()
            .iter()
            .chain(plan.failed_steps().iter())
            .chain(plan.next_steps().iter())
            .find(|s| s.agent == node)
            .map(|s| s.id.clone());

        let Some(step_id) = step_id else {
            return;
        };

        let failed = step_failure_message(output);
        let Some(step) = plan.step_mut(&step_id) else {
            return;
        };
        match failed {
            Some(message) => {
                warn!(node, step_id = %step.id, "Plan step failed");
                step.status = StepStatus::Failed;
                step.error = Some(message);
            }
            None => {
                debug!(node, step_id = %step.id, "Plan step completed");
                step.status = StepStatus::Completed;
                step.result = Some(output.clone());
                step.error = None;
            }
        }
        plan.refresh_status();
    }
}

/// A failure marker inside a step output: an object carrying
/// `"status": "failed"`, with the optional `"error"` field as the
/// message. Agents return text, so JSON strings are parsed first.
fn step_failure_message(output: &serde_json::Value) -> Option<String> {
    if let serde_json::Value::String(s) = output {
        let parsed: serde_json::Value = serde_json::from_str(s.trim()).ok()?;
        return step_failure_message(&parsed);
    }
    let obj = output.as_object()?;
    if obj.get("status").and_then(|s| s.as_str()) == Some("failed") {
        Some(
            obj.get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("step reported failure")
                .to_string(),
        )
    } else {
        None
    }
}

/// Try to read an execution plan document out of a node output.
///
/// Accepts a JSON object with a `"plan"` payload, a bare plan-shaped object
/// (`title` + `steps`), or a JSON string encoding either.
pub fn extract_plan(output: &serde_json::Value) -> Option<ExecutionPlan> {
    match output {
        serde_json::Value::String(s) => {
            let parsed: serde_json::Value = serde_json::from_str(s.trim()).ok()?;
            extract_plan(&parsed)
        }
        serde_json::Value::Object(obj) => {
            if let Some(inner) = obj.get("plan") {
                serde_json::from_value(inner.clone()).ok()
            } else if obj.contains_key("title") && obj.contains_key("steps") {
                serde_json::from_value(output.clone()).ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

impl Memory for PlanAwareMemory {
    fn add(&mut self, node: &str, output: serde_json::Value) {
        if let Some(plan) = extract_plan(&output) {
            self.add_plan(plan);
        } else {
            self.record_step_output(node, &output);
        }
        self.base.add(node, output);
    }

    fn get(&self, filter: Option<&[String]>) -> Vec<MemoryItem> {
        self.base.get(filter)
    }

    fn len(&self) -> usize {
        self.base.len()
    }

    fn fresh(&self) -> Box<dyn Memory> {
        Box::new(PlanAwareMemory::new())
    }

    fn as_plan_store(&self) -> Option<&dyn PlanStore> {
        Some(self)
    }
}

impl PlanStore for PlanAwareMemory {
    fn current_plan(&self) -> Option<ExecutionPlan> {
        self.current
            .as_ref()
            .and_then(|id| self.plans.get(id))
            .cloned()
    }

    fn plan(&self, id: &str) -> Option<ExecutionPlan> {
        self.plans.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStep;

    fn plan_with_steps() -> ExecutionPlan {
        ExecutionPlan::new("report", "write a report")
            .with_step(PlanStep::new("s1", "collect data", "collector"))
            .with_step(
                PlanStep::new("s2", "draft report", "drafter").depends_on(vec!["s1".into()]),
            )
    }

    #[test]
    fn test_most_recent_plan_becomes_current() {
        let mut mem = PlanAwareMemory::new();
        let first = ExecutionPlan::new("first", "");
        let second = ExecutionPlan::new("second", "");
        let first_id = first.id.clone();

        mem.add_plan(first);
        mem.add_plan(second);

        assert_eq!(mem.current_plan().unwrap().title, "second");
        assert_eq!(mem.plan(&first_id).unwrap().title, "first");
    }

    #[test]
    fn test_plan_ingested_from_node_output() {
        let mut mem = PlanAwareMemory::new();
        let output = serde_json::json!({
            "plan": {
                "title": "research",
                "steps": [
                    { "id": "s1", "description": "look things up", "agent": "researcher" }
                ]
            }
        });
        mem.add("planner", output);

        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.title, "research");
        assert_eq!(plan.steps.len(), 1);
        // The raw output is still recorded in the log
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_plan_ingested_from_json_string_output() {
        let mut mem = PlanAwareMemory::new();
        let text = r#"{"plan": {"title": "t", "steps": []}}"#;
        mem.add("planner", serde_json::json!(text));
        assert!(mem.current_plan().is_some());
    }

    #[test]
    fn test_step_completed_by_assigned_agent_output() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan_with_steps());

        mem.add("collector", serde_json::json!("data collected"));
        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.step("s1").unwrap().status, StepStatus::Completed);
        assert_eq!(
            plan.step("s1").unwrap().result,
            Some(serde_json::json!("data collected"))
        );

        // s2 became eligible and completes from the drafter's output
        mem.add("drafter", serde_json::json!("draft ready"));
        let plan = mem.current_plan().unwrap();
        assert!(plan.is_completed());
    }

    #[test]
    fn test_step_failure_marker() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan_with_steps());

        mem.add(
            "collector",
            serde_json::json!({"status": "failed", "error": "source unreachable"}),
        );
        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.step("s1").unwrap().status, StepStatus::Failed);
        assert_eq!(
            plan.step("s1").unwrap().error.as_deref(),
            Some("source unreachable")
        );
        assert!(plan.has_failed_steps());
    }

    #[test]
    fn test_failed_step_recovers_from_retry_output() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan_with_steps());

        // Agents return text, so the failure marker arrives as a JSON
        // string
        mem.add(
            "collector",
            serde_json::json!(r#"{"status": "failed", "error": "timeout"}"#),
        );
        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.step("s1").unwrap().status, StepStatus::Failed);

        mem.add("collector", serde_json::json!("second try worked"));
        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.step("s1").unwrap().status, StepStatus::Completed);
        assert!(plan.step("s1").unwrap().error.is_none());
    }

    #[test]
    fn test_unrelated_output_leaves_plan_untouched() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan_with_steps());

        mem.add("bystander", serde_json::json!("noise"));
        let plan = mem.current_plan().unwrap();
        assert_eq!(plan.step("s1").unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn test_update_step_status_explicit() {
        let mut mem = PlanAwareMemory::new();
        let plan = plan_with_steps();
        let plan_id = plan.id.clone();
        mem.add_plan(plan);

        mem.update_step_status(&plan_id, "s1", StepStatus::Skipped, None, None)
            .unwrap();
        assert_eq!(
            mem.current_plan().unwrap().step("s1").unwrap().status,
            StepStatus::Skipped
        );

        let err = mem
            .update_step_status("missing", "s1", StepStatus::Completed, None, None)
            .unwrap_err();
        assert!(matches!(err, AriumError::PlanNotFound(_)));
    }

    #[test]
    fn test_fresh_drops_plans() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan_with_steps());
        let fresh = mem.fresh();
        assert!(fresh.as_plan_store().unwrap().current_plan().is_none());
    }
}
