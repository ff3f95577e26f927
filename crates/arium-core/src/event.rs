use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle event emitted during a workflow run.
///
/// Every event carries its emission timestamp. Emission is optional and
/// never influences control flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        inputs: usize,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        steps: usize,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
    WorkflowFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        node: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },
    NodeCompleted {
        node: String,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        node: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RouterDecision {
        source: String,
        decision: String,
        timestamp: DateTime<Utc>,
    },
    EdgeTraversed {
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkflowEvent::WorkflowStarted { .. } => EventKind::WorkflowStarted,
            WorkflowEvent::WorkflowCompleted { .. } => EventKind::WorkflowCompleted,
            WorkflowEvent::WorkflowFailed { .. } => EventKind::WorkflowFailed,
            WorkflowEvent::NodeStarted { .. } => EventKind::NodeStarted,
            WorkflowEvent::NodeCompleted { .. } => EventKind::NodeCompleted,
            WorkflowEvent::NodeFailed { .. } => EventKind::NodeFailed,
            WorkflowEvent::RouterDecision { .. } => EventKind::RouterDecision,
            WorkflowEvent::EdgeTraversed { .. } => EventKind::EdgeTraversed,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkflowEvent::WorkflowStarted { timestamp, .. }
            | WorkflowEvent::WorkflowCompleted { timestamp, .. }
            | WorkflowEvent::WorkflowFailed { timestamp, .. }
            | WorkflowEvent::NodeStarted { timestamp, .. }
            | WorkflowEvent::NodeCompleted { timestamp, .. }
            | WorkflowEvent::NodeFailed { timestamp, .. }
            | WorkflowEvent::RouterDecision { timestamp, .. }
            | WorkflowEvent::EdgeTraversed { timestamp, .. } => *timestamp,
        }
    }
}

/// Discriminant used to filter which events a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    RouterDecision,
    EdgeTraversed,
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
