use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

/// Histogram buckets for whole-run durations (in seconds).
const RUN_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Histogram buckets for single-node executions (in seconds).
const NODE_DURATION_BUCKETS: &[f64] = &[
    0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0,
];

/// Prometheus metrics for workflow runs.
///
/// Fully optional: a workflow without metrics attached records nothing,
/// and recording never influences control flow.
pub struct WorkflowMetrics {
    registry: Registry,
    runs_total: CounterVec,
    nodes_total: CounterVec,
    run_duration: HistogramVec,
    node_duration: HistogramVec,
}

impl WorkflowMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let runs_total = CounterVec::new(
            Opts::new("arium_runs_total", "Finished workflow runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let nodes_total = CounterVec::new(
            Opts::new(
                "arium_nodes_executed_total",
                "Node executions by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(nodes_total.clone()))?;

        let run_duration = HistogramVec::new(
            HistogramOpts::new("arium_run_duration_seconds", "Workflow run duration")
                .buckets(RUN_DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        registry.register(Box::new(run_duration.clone()))?;

        let node_duration = HistogramVec::new(
            HistogramOpts::new("arium_node_duration_seconds", "Node execution duration")
                .buckets(NODE_DURATION_BUCKETS.to_vec()),
            &["kind"],
        )?;
        registry.register(Box::new(node_duration.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            nodes_total,
            run_duration,
            node_duration,
        })
    }

    /// The backing registry, for scraping or text export.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn record_run(&self, outcome: &str, seconds: f64) {
        self.runs_total.with_label_values(&[outcome]).inc();
        self.run_duration
            .with_label_values(&[outcome])
            .observe(seconds);
    }

    pub(crate) fn record_node(&self, kind: &str, outcome: &str, seconds: f64) {
        self.nodes_total.with_label_values(&[kind, outcome]).inc();
        self.node_duration
            .with_label_values(&[kind])
            .observe(seconds);
    }
}
