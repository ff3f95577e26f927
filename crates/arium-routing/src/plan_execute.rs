use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use arium_core::error::Result;
use arium_core::traits::ModelClient;
use arium_memory::{ExecutionPlan, Memory};

use crate::context::ExecutionContext;
use crate::decision::{loop_risk_section, DecisionCore, Destination, FallbackStrategy};
use crate::router::Router;

const SYSTEM_PROMPT: &str = "You pick which eligible plan step to execute \
next. Reply with the assigned agent's name only.";

/// Plan-aware router.
///
/// No current plan routes to the planner; a plan with a failed step routes
/// back to that step's agent for recovery; a fully completed plan routes
/// to the reviewer; otherwise the next dependency-satisfied step's agent
/// is chosen. The plan state fully determines the destination except when
/// several steps are eligible at once, where an optional model tie-break
/// applies.
pub struct PlanExecuteRouter {
    planner: String,
    reviewer: String,
    agents: Vec<String>,
    model: Option<Arc<dyn ModelClient>>,
    max_retries: usize,
    fallback: FallbackStrategy,
}

impl PlanExecuteRouter {
    pub fn new(planner: impl Into<String>, reviewer: impl Into<String>) -> Self {
        Self {
            planner: planner.into(),
            reviewer: reviewer.into(),
            agents: vec![],
            model: None,
            max_retries: 3,
            fallback: FallbackStrategy::First,
        }
    }

    /// Declare the agent nodes plan steps may be assigned to. Declaring
    /// them makes the router's return domain statically known.
    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = agents;
        self
    }

    /// Attach a model for tie-breaking between concurrently eligible
    /// steps.
    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    async fn tiebreak(
        &self,
        plan: &ExecutionPlan,
        eligible: &[(String, String)],
        ctx: Option<&ExecutionContext>,
    ) -> Result<String> {
        let Some(model) = &self.model else {
            // Deterministic without a model: first eligible step wins.
            return Ok(eligible[0].0.clone());
        };

        let mut core = DecisionCore::new(model.clone());
        core.max_retries = self.max_retries;
        core.fallback = self.fallback;
        for (agent, description) in eligible {
            core.destinations.push(Destination::new(agent, description));
        }

        let user = format!(
            "{}\n{}Eligible steps:\n{}\n\nReply with one agent name.",
            plan.render(),
            loop_risk_section(ctx),
            core.render_destinations(),
        );
        core.decide(SYSTEM_PROMPT.to_string(), user).await
    }
}

impl Router for PlanExecuteRouter {
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let current = memory.as_plan_store().and_then(|s| s.current_plan());
            let Some(plan) = current else {
                debug!(planner = %self.planner, "No current plan, routing to planner");
                return Ok(self.planner.clone());
            };

            if let Some(step) = plan.failed_steps().first() {
                debug!(step_id = %step.id, agent = %step.agent, "Routing failed step to its agent for recovery");
                return Ok(step.agent.clone());
            }

            if plan.is_completed() {
                debug!(reviewer = %self.reviewer, "Plan completed, routing to reviewer");
                return Ok(self.reviewer.clone());
            }

            let eligible: Vec<(String, String)> = plan
                .next_steps()
                .iter()
                .map(|s| (s.agent.clone(), s.description.clone()))
                .collect();

            match eligible.len() {
                0 => {
                    // Nothing eligible: stay with an in-flight step's
                    // agent, else hand back to the planner for a replan.
                    if let Some(step) = plan.in_progress_steps().first() {
                        Ok(step.agent.clone())
                    } else {
                        Ok(self.planner.clone())
                    }
                }
                1 => Ok(eligible[0].0.clone()),
                _ => self.tiebreak(&plan, &eligible, ctx).await,
            }
        })
    }

    fn domain(&self) -> Option<Vec<String>> {
        if self.agents.is_empty() {
            return None;
        }
        let mut names = vec![self.planner.clone(), self.reviewer.clone()];
        for agent in &self.agents {
            if !names.contains(agent) {
                names.push(agent.clone());
            }
        }
        Some(names)
    }

    fn allows_self_reference(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arium_memory::{PlanAwareMemory, PlanStep, StepStatus, WorkflowMemory};
    use arium_test_utils::MockModelClient;

    fn router() -> PlanExecuteRouter {
        PlanExecuteRouter::new("planner", "reviewer")
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan::new("p", "")
            .with_step(PlanStep::new("s1", "collect", "collector"))
            .with_step(PlanStep::new("s2", "draft", "drafter").depends_on(vec!["s1".into()]))
    }

    #[tokio::test]
    async fn test_no_plan_routes_to_planner() {
        let mem = PlanAwareMemory::new();
        assert_eq!(router().route(&mem, None).await.unwrap(), "planner");
    }

    #[tokio::test]
    async fn test_plain_memory_routes_to_planner() {
        // Memory without plan support behaves like "no plan yet"
        let mem = WorkflowMemory::new();
        assert_eq!(router().route(&mem, None).await.unwrap(), "planner");
    }

    #[tokio::test]
    async fn test_next_eligible_step_agent() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(plan());
        assert_eq!(router().route(&mem, None).await.unwrap(), "collector");
    }

    #[tokio::test]
    async fn test_completed_plan_routes_to_reviewer() {
        let mut mem = PlanAwareMemory::new();
        let p = plan();
        let id = p.id.clone();
        mem.add_plan(p);
        mem.update_step_status(&id, "s1", StepStatus::Completed, None, None)
            .unwrap();
        mem.update_step_status(&id, "s2", StepStatus::Completed, None, None)
            .unwrap();
        assert_eq!(router().route(&mem, None).await.unwrap(), "reviewer");
    }

    #[tokio::test]
    async fn test_failed_step_routes_to_its_agent() {
        let mut mem = PlanAwareMemory::new();
        let p = plan();
        let id = p.id.clone();
        mem.add_plan(p);
        mem.update_step_status(&id, "s1", StepStatus::Failed, None, Some("boom".into()))
            .unwrap();
        assert_eq!(router().route(&mem, None).await.unwrap(), "collector");
    }

    #[tokio::test]
    async fn test_in_progress_step_keeps_its_agent() {
        let mut mem = PlanAwareMemory::new();
        let p = plan();
        let id = p.id.clone();
        mem.add_plan(p);
        mem.update_step_status(&id, "s1", StepStatus::InProgress, None, None)
            .unwrap();
        assert_eq!(router().route(&mem, None).await.unwrap(), "collector");
    }

    #[tokio::test]
    async fn test_multiple_eligible_steps_without_model_takes_first() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(
            ExecutionPlan::new("p", "")
                .with_step(PlanStep::new("s1", "a", "agent_a"))
                .with_step(PlanStep::new("s2", "b", "agent_b")),
        );
        assert_eq!(router().route(&mem, None).await.unwrap(), "agent_a");
    }

    #[tokio::test]
    async fn test_multiple_eligible_steps_with_model_tiebreak() {
        let mut mem = PlanAwareMemory::new();
        mem.add_plan(
            ExecutionPlan::new("p", "")
                .with_step(PlanStep::new("s1", "a", "agent_a"))
                .with_step(PlanStep::new("s2", "b", "agent_b")),
        );
        let r = router().with_model(Arc::new(MockModelClient::always("agent_b")));
        assert_eq!(r.route(&mem, None).await.unwrap(), "agent_b");
    }

    #[test]
    fn test_domain_requires_declared_agents() {
        assert!(router().domain().is_none());
        let r = router().with_agents(vec!["collector".into(), "drafter".into()]);
        assert_eq!(
            r.domain(),
            Some(vec![
                "planner".to_string(),
                "reviewer".to_string(),
                "collector".to_string(),
                "drafter".to_string()
            ])
        );
    }
}
