use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, info_span, Instrument};

use arium_core::error::{AriumError, Result};
use arium_core::event::{EventBus, EventKind, WorkflowEvent};
use arium_core::types::WorkflowInput;
use arium_memory::{Memory, MemoryItem, INPUT_NODE};
use arium_routing::ExecutionContext;

use crate::builder::START_SENTINEL;
use crate::edge::Edge;
use crate::metrics::WorkflowMetrics;
use crate::node::{Node, Variables};
use crate::variables::{placeholders, substitute};

/// A compiled, executable workflow graph.
///
/// Interprets the graph as a state machine over node names: from the
/// start sentinel, repeatedly execute the current node, record its output
/// to memory, and consult the current edge's router, halting on any end
/// sentinel. Branching selects exactly one successor; one node runs to
/// completion before the router is consulted.
pub struct Arium {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    step_limit: usize,
    visit_limit: usize,
    memory: Arc<RwLock<Box<dyn Memory>>>,
    event_bus: Option<Arc<EventBus>>,
    event_filter: Option<Vec<EventKind>>,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl std::fmt::Debug for Arium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arium")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges.keys().collect::<Vec<_>>())
            .field("step_limit", &self.step_limit)
            .field("visit_limit", &self.visit_limit)
            .field("event_bus", &self.event_bus.is_some())
            .field("event_filter", &self.event_filter)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Arium {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        nodes: HashMap<String, Node>,
        edges: HashMap<String, Edge>,
        step_limit: usize,
        visit_limit: usize,
        memory: Box<dyn Memory>,
        event_bus: Option<Arc<EventBus>>,
        event_filter: Option<Vec<EventKind>>,
        metrics: Option<Arc<WorkflowMetrics>>,
    ) -> Self {
        Self {
            nodes,
            edges,
            step_limit,
            visit_limit,
            memory: Arc::new(RwLock::new(memory)),
            event_bus,
            event_filter,
            metrics,
        }
    }

    /// Run the workflow to completion and return the full memory log.
    pub async fn run(
        &mut self,
        inputs: Vec<WorkflowInput>,
        variables: Variables,
    ) -> Result<Vec<MemoryItem>> {
        let span = info_span!("workflow_run", inputs = inputs.len());
        self.execute(inputs, variables).instrument(span).await
    }

    async fn execute(
        &mut self,
        inputs: Vec<WorkflowInput>,
        variables: Variables,
    ) -> Result<Vec<MemoryItem>> {
        let started = Instant::now();
        info!(inputs = inputs.len(), "Workflow run started");
        self.emit(WorkflowEvent::WorkflowStarted {
            inputs: inputs.len(),
            timestamp: Utc::now(),
        });

        // Fail fast on unresolved placeholders, then substitute exactly
        // once.
        if let Err(e) = self.resolve_variables(&inputs, &variables) {
            return Err(self.abort(started, e).await);
        }
        let seed: Vec<serde_json::Value> = inputs
            .into_iter()
            .map(|input| match input {
                WorkflowInput::Text(s) => {
                    serde_json::Value::String(substitute(&s, &variables))
                }
                WorkflowInput::Message(m) => serde_json::json!({
                    "role": m.role,
                    "content": substitute(&m.content, &variables),
                }),
                WorkflowInput::Value(v) => v,
            })
            .collect();

        {
            let mut memory = self.memory.write().await;
            for value in seed {
                memory.add(INPUT_NODE, value);
            }
        }

        // Agent prompts were already substituted; agents never
        // re-substitute.
        let empty_variables = Variables::new();

        let mut current = START_SENTINEL.to_string();
        let mut steps = 0usize;
        let mut visits: HashMap<String, usize> = HashMap::new();
        let mut path: Vec<String> = Vec::new();

        loop {
            let Some(node) = self.nodes.get(&current) else {
                let e = AriumError::NodeNotFound(current);
                return Err(self.abort(started, e).await);
            };
            if node.is_end() {
                break;
            }

            if !node.is_start() {
                steps += 1;
                let count = visits.entry(current.clone()).or_insert(0);
                *count += 1;
                if *count > self.visit_limit || steps > self.step_limit {
                    let e = AriumError::PossibleInfiniteLoop {
                        node: current.clone(),
                        steps,
                        path: path.clone(),
                    };
                    return Err(self.abort(started, e).await);
                }
                path.push(current.clone());

                let node_inputs: Vec<serde_json::Value> = {
                    let memory = self.memory.read().await;
                    memory
                        .get(node.input_filter())
                        .iter()
                        .map(|item| item.output.clone())
                        .collect()
                };

                self.emit(WorkflowEvent::NodeStarted {
                    node: current.clone(),
                    kind: node.kind().as_str().to_string(),
                    timestamp: Utc::now(),
                });

                let run_variables = if node.is_agent() {
                    &empty_variables
                } else {
                    &variables
                };
                let node_started = Instant::now();
                let node_span =
                    info_span!("node_run", node = %current, kind = node.kind().as_str());
                let result = node
                    .run(node_inputs, run_variables)
                    .instrument(node_span)
                    .await;
                let node_elapsed = node_started.elapsed();

                match result {
                    Ok(output) => {
                        let output = output.into_recorded();
                        debug!(
                            node = %current,
                            elapsed_ms = node_elapsed.as_millis() as u64,
                            "Node execution complete"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_node(
                                node.kind().as_str(),
                                "ok",
                                node_elapsed.as_secs_f64(),
                            );
                        }
                        self.emit(WorkflowEvent::NodeCompleted {
                            node: current.clone(),
                            elapsed_ms: node_elapsed.as_millis() as u64,
                            timestamp: Utc::now(),
                        });
                        if !output_is_empty(&output) {
                            self.memory.write().await.add(&current, output);
                        }
                    }
                    Err(e) => {
                        error!(node = %current, error = %e, "Node execution failed");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_node(
                                node.kind().as_str(),
                                "error",
                                node_elapsed.as_secs_f64(),
                            );
                        }
                        self.emit(WorkflowEvent::NodeFailed {
                            node: current.clone(),
                            error: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        let wrapped = AriumError::NodeExecution {
                            node: current.clone(),
                            message: e.to_string(),
                        };
                        return Err(self.abort(started, wrapped).await);
                    }
                }
            }

            let Some(edge) = self.edges.get(&current) else {
                let e = AriumError::Config(format!(
                    "node '{}' has no outgoing edge",
                    current
                ));
                return Err(self.abort(started, e).await);
            };

            let ctx = ExecutionContext {
                node_visit_count: visits.clone(),
                execution_path: path.clone(),
                iteration_count: steps,
                current_node: current.clone(),
            };

            let decision = {
                let memory = self.memory.read().await;
                edge.router.route(&**memory, Some(&ctx)).await
            };
            let decision = match decision {
                Ok(name) => name,
                Err(e) => return Err(self.abort(started, e).await),
            };

            debug!(source = %current, decision = %decision, "Router decision");
            self.emit(WorkflowEvent::RouterDecision {
                source: current.clone(),
                decision: decision.clone(),
                timestamp: Utc::now(),
            });

            if !edge.targets.iter().any(|t| t == &decision) {
                let e = AriumError::UnknownDestination {
                    from_node: current.clone(),
                    returned: decision,
                    destinations: edge.targets.clone(),
                };
                return Err(self.abort(started, e).await);
            }

            self.emit(WorkflowEvent::EdgeTraversed {
                from: current.clone(),
                to: decision.clone(),
                timestamp: Utc::now(),
            });
            current = decision;
        }

        let items = self.memory.read().await.get(None);
        let elapsed = started.elapsed();
        info!(
            steps,
            elapsed_ms = elapsed.as_millis() as u64,
            "Workflow run completed"
        );
        self.emit(WorkflowEvent::WorkflowCompleted {
            steps,
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        });
        if let Some(metrics) = &self.metrics {
            metrics.record_run("ok", elapsed.as_secs_f64());
        }
        self.reset_memory().await;
        Ok(items)
    }

    /// Scan initial inputs and agent prompts for `{placeholders}` and
    /// fail fast when the caller's mapping misses any, itemized by
    /// source. On success, substitute agent prompts once.
    fn resolve_variables(
        &mut self,
        inputs: &[WorkflowInput],
        variables: &Variables,
    ) -> Result<()> {
        let mut missing_input: BTreeSet<String> = BTreeSet::new();
        for input in inputs {
            for name in placeholders(&input.text()) {
                if !variables.contains_key(&name) {
                    missing_input.insert(name);
                }
            }
        }
        if !missing_input.is_empty() {
            return Err(AriumError::MissingInputVariables {
                names: missing_input.into_iter().collect(),
            });
        }

        let mut missing_prompt: BTreeSet<String> = BTreeSet::new();
        let mut agents: BTreeSet<String> = BTreeSet::new();
        for node in self.nodes.values() {
            if let Some(prompt) = node.static_prompt() {
                for name in placeholders(prompt) {
                    if !variables.contains_key(&name) {
                        missing_prompt.insert(name);
                        agents.insert(node.name().to_string());
                    }
                }
            }
        }
        if !missing_prompt.is_empty() {
            return Err(AriumError::MissingPromptVariables {
                names: missing_prompt.into_iter().collect(),
                agents: agents.into_iter().collect(),
            });
        }

        for node in self.nodes.values_mut() {
            node.resolve_prompt(variables);
        }
        Ok(())
    }

    /// Record the failure on the optional event/metrics channel, discard
    /// the run's memory, and hand the error back for propagation.
    async fn abort(&self, started: Instant, error: AriumError) -> AriumError {
        error!(error = %error, "Workflow run failed");
        self.emit(WorkflowEvent::WorkflowFailed {
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        if let Some(metrics) = &self.metrics {
            metrics.record_run("error", started.elapsed().as_secs_f64());
        }
        self.reset_memory().await;
        error
    }

    /// Swap in a fresh memory instance to prevent cross-run leakage.
    async fn reset_memory(&self) {
        let mut memory = self.memory.write().await;
        let fresh = memory.fresh();
        *memory = fresh;
    }

    fn emit(&self, event: WorkflowEvent) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        if let Some(filter) = &self.event_filter {
            if !filter.contains(&event.kind()) {
                return;
            }
        }
        bus.publish(event);
    }
}

/// An empty result (null or empty string) is not recorded to memory.
fn output_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
