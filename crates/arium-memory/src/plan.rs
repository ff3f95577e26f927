use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a single plan step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::Pending
    }
}

/// Status of a whole plan, derived from its steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Default for PlanStatus {
    fn default() -> Self {
        PlanStatus::Pending
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A single step of an execution plan, assigned to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default = "new_id")]
    pub id: String,
    pub description: String,
    /// Name of the agent node responsible for this step.
    pub agent: String,
    /// Step ids that must be Completed before this step becomes eligible.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PlanStep {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            agent: agent.into(),
            depends_on: vec![],
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Add dependency step ids.
    pub fn depends_on(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }
}

/// A dependency-ordered task breakdown used by plan-execute routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default = "new_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub status: PlanStatus,
}

impl ExecutionPlan {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            steps: vec![],
            status: PlanStatus::Pending,
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Steps currently eligible to run: Pending with every dependency
    /// Completed.
    pub fn next_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending && self.deps_completed(s))
            .collect()
    }

    /// Steps currently marked InProgress.
    pub fn in_progress_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
            .collect()
    }

    /// Steps that have failed.
    pub fn failed_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .collect()
    }

    /// A plan is completed iff all steps are Completed.
    pub fn is_completed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn has_failed_steps(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    fn deps_completed(&self, step: &PlanStep) -> bool {
        step.depends_on.iter().all(|dep| {
            self.step(dep)
                .map(|d| d.status == StepStatus::Completed)
                .unwrap_or(false)
        })
    }

    /// Recompute the plan status from its steps.
    pub fn refresh_status(&mut self) {
        self.status = if self.is_completed() {
            PlanStatus::Completed
        } else if self.has_failed_steps() {
            PlanStatus::Failed
        } else if self
            .steps
            .iter()
            .any(|s| s.status != StepStatus::Pending)
        {
            PlanStatus::InProgress
        } else {
            PlanStatus::Pending
        };
    }

    /// Render the plan as a compact text table for router prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Plan: {} — {}\n", self.title, self.description);
        for step in &self.steps {
            out.push_str(&format!(
                "- [{:?}] {} (agent: {}{})\n",
                step.status,
                step.description,
                step.agent,
                if step.depends_on.is_empty() {
                    String::new()
                } else {
                    format!(", after: {}", step.depends_on.join(", "))
                }
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_plan() -> ExecutionPlan {
        ExecutionPlan::new("research", "research and summarize")
            .with_step(PlanStep::new("s1", "gather sources", "researcher"))
            .with_step(
                PlanStep::new("s2", "summarize findings", "writer")
                    .depends_on(vec!["s1".into()]),
            )
    }

    #[test]
    fn test_next_steps_respects_dependencies() {
        let mut plan = two_step_plan();

        let next: Vec<&str> = plan.next_steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(next, vec!["s1"]);

        plan.step_mut("s1").unwrap().status = StepStatus::Completed;
        let next: Vec<&str> = plan.next_steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(next, vec!["s2"]);

        plan.step_mut("s2").unwrap().status = StepStatus::Completed;
        assert!(plan.next_steps().is_empty());
        assert!(plan.is_completed());
    }

    #[test]
    fn test_failed_steps() {
        let mut plan = two_step_plan();
        plan.step_mut("s1").unwrap().status = StepStatus::Failed;
        assert!(plan.has_failed_steps());
        assert!(!plan.is_completed());
        assert_eq!(plan.failed_steps()[0].id, "s1");
    }

    #[test]
    fn test_refresh_status() {
        let mut plan = two_step_plan();
        plan.refresh_status();
        assert_eq!(plan.status, PlanStatus::Pending);

        plan.step_mut("s1").unwrap().status = StepStatus::InProgress;
        plan.refresh_status();
        assert_eq!(plan.status, PlanStatus::InProgress);

        plan.step_mut("s1").unwrap().status = StepStatus::Completed;
        plan.step_mut("s2").unwrap().status = StepStatus::Completed;
        plan.refresh_status();
        assert_eq!(plan.status, PlanStatus::Completed);
    }

    #[test]
    fn test_unknown_dependency_blocks_step() {
        let plan = ExecutionPlan::new("p", "")
            .with_step(PlanStep::new("s1", "blocked", "a").depends_on(vec!["ghost".into()]));
        assert!(plan.next_steps().is_empty());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = serde_json::json!({
            "title": "t",
            "steps": [
                { "description": "d", "agent": "a" }
            ]
        });
        let plan: ExecutionPlan = serde_json::from_value(json).unwrap();
        assert!(!plan.id.is_empty());
        assert_eq!(plan.steps[0].status, StepStatus::Pending);
        assert!(!plan.steps[0].id.is_empty());
    }

    #[test]
    fn test_empty_plan_is_not_completed() {
        let plan = ExecutionPlan::new("empty", "");
        assert!(!plan.is_completed());
    }
}
