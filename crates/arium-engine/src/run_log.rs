use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use arium_core::event::{EventBus, WorkflowEvent};

/// JSONL run logger.
///
/// Subscribes to the event bus and writes one JSON object per line. The
/// format is append-only and crash-resilient: even if the process dies
/// mid-run, all previously written lines are intact.
pub struct RunLogger {
    log_dir: PathBuf,
}

impl RunLogger {
    /// Logs are written to `{log_dir}/{timestamp}.jsonl`.
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    /// Run the logger as a background task.
    ///
    /// Writes JSONL until cancellation or until the workflow completes or
    /// fails.
    pub async fn run(self, event_bus: Arc<EventBus>, cancel: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%f").to_string();
        let log_path = self.log_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");

        let mut writer = tokio::io::BufWriter::new(file);
        let mut rx = event_bus.subscribe();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                let line = format!("{}\n", json);
                                if let Err(e) = writer.write_all(line.as_bytes()).await {
                                    error!(error = %e, "Failed to write log entry");
                                    break;
                                }
                                // Flush after each entry for crash resilience
                                if let Err(e) = writer.flush().await {
                                    error!(error = %e, "Failed to flush log");
                                }
                            }

                            // Stop logging after the run completes or fails
                            if matches!(
                                event,
                                WorkflowEvent::WorkflowCompleted { .. }
                                    | WorkflowEvent::WorkflowFailed { .. }
                            ) {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            debug!("Event bus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = writer.flush().await {
            error!(error = %e, "Failed to flush log on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_events_until_run_completes() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::default());
        let logger = RunLogger::new(dir.path().to_path_buf());

        let handle = tokio::spawn(logger.run(bus.clone(), CancellationToken::new()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        bus.publish(WorkflowEvent::NodeStarted {
            node: "a".into(),
            kind: "function".into(),
            timestamp: Utc::now(),
        });
        bus.publish(WorkflowEvent::WorkflowCompleted {
            steps: 1,
            elapsed_ms: 3,
            timestamp: Utc::now(),
        });

        handle.await.unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let path = entries.next().unwrap().unwrap().path();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "node_started");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "workflow_completed");
    }

    #[tokio::test]
    async fn test_cancellation_stops_logger() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::default());
        let cancel = CancellationToken::new();
        let logger = RunLogger::new(dir.path().to_path_buf());

        let handle = tokio::spawn(logger.run(bus.clone(), cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
