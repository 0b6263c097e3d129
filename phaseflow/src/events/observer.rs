//! Observer trait and implementations.

use crate::core::PipelineState;
use crate::machine::RunInfo;
use serde::Serialize;
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Receives lifecycle events of a machine's top-level run.
///
/// Callbacks run on whichever thread is driving the run, with no machine
/// lock held. They should return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionObserver: Send + Sync {
    /// The run was started by `execute`.
    fn run_started(&self, _run: &RunInfo) {}

    /// The run paused and control is returning to the caller.
    fn run_paused(&self, _run: &RunInfo) {}

    /// The run resumed after a pause.
    fn run_resumed(&self, _run: &RunInfo) {}

    /// The run reported its terminal outcome.
    fn run_completed(&self, _run: &RunInfo, _outcome: &PipelineState) {}
}

/// An observer that ignores all events.
///
/// Used as the default when no observer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ExecutionObserver for NoOpObserver {}

/// An observer that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    level: Level,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingObserver {
    /// Creates a logging observer with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging observer.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging observer.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, kind: RunEventKind, run: &RunInfo, outcome: Option<&PipelineState>) {
        let outcome = outcome.map(ToString::to_string);
        let attributes = run.span_attributes().to_otel_attributes();
        if self.level == Level::DEBUG {
            debug!(
                event_type = kind.as_str(),
                run_id = %run.run_id,
                pipeline = %run.pipeline,
                outcome = ?outcome,
                attributes = ?attributes,
                "Event: {}", kind.as_str()
            );
        } else {
            info!(
                event_type = kind.as_str(),
                run_id = %run.run_id,
                pipeline = %run.pipeline,
                outcome = ?outcome,
                attributes = ?attributes,
                "Event: {}", kind.as_str()
            );
        }
    }
}

impl ExecutionObserver for LoggingObserver {
    fn run_started(&self, run: &RunInfo) {
        self.log_event(RunEventKind::Started, run, None);
    }

    fn run_paused(&self, run: &RunInfo) {
        self.log_event(RunEventKind::Paused, run, None);
    }

    fn run_resumed(&self, run: &RunInfo) {
        self.log_event(RunEventKind::Resumed, run, None);
    }

    fn run_completed(&self, run: &RunInfo, outcome: &PipelineState) {
        let kind = if outcome.is_failed() {
            RunEventKind::Failed
        } else {
            RunEventKind::Succeeded
        };
        self.log_event(kind, run, Some(outcome));
    }
}

/// Kind of a recorded run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// `run_started`.
    Started,
    /// `run_paused`.
    Paused,
    /// `run_resumed`.
    Resumed,
    /// `run_completed` with `Succeeded`.
    Succeeded,
    /// `run_completed` with `Failed`.
    Failed,
}

impl RunEventKind {
    /// Returns the event type string, e.g. `"run.paused"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "run.started",
            Self::Paused => "run.paused",
            Self::Resumed => "run.resumed",
            Self::Succeeded => "run.succeeded",
            Self::Failed => "run.failed",
        }
    }
}

/// A run event recorded by [`CollectingObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunEvent {
    /// What happened.
    pub kind: RunEventKind,
    /// The run it happened to.
    pub run_id: Uuid,
    /// Name of the run's pipeline.
    pub pipeline: String,
}

/// A collecting observer for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: parking_lot::RwLock<Vec<RunEvent>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Returns the kinds of all collected events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<RunEventKind> {
        self.events.read().iter().map(|event| event.kind).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    fn record(&self, kind: RunEventKind, run: &RunInfo) {
        self.events.write().push(RunEvent {
            kind,
            run_id: run.run_id,
            pipeline: run.pipeline.clone(),
        });
    }
}

impl ExecutionObserver for CollectingObserver {
    fn run_started(&self, run: &RunInfo) {
        self.record(RunEventKind::Started, run);
    }

    fn run_paused(&self, run: &RunInfo) {
        self.record(RunEventKind::Paused, run);
    }

    fn run_resumed(&self, run: &RunInfo) {
        self.record(RunEventKind::Resumed, run);
    }

    fn run_completed(&self, run: &RunInfo, outcome: &PipelineState) {
        let kind = if outcome.is_failed() {
            RunEventKind::Failed
        } else {
            RunEventKind::Succeeded
        };
        self.record(kind, run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Failure;

    fn run_info() -> RunInfo {
        RunInfo {
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            pipeline: "respond".to_string(),
            depth: 0,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_noop_observer() {
        let observer = NoOpObserver;
        let run = run_info();
        observer.run_started(&run);
        observer.run_completed(&run, &PipelineState::Succeeded);
        // Should not panic
    }

    #[test]
    fn test_logging_observer() {
        let observer = LoggingObserver::debug();
        let run = run_info();
        observer.run_paused(&run);
        observer.run_completed(&run, &PipelineState::Failed(Failure::new(anyhow::anyhow!("x"))));
        // Should not panic
    }

    #[test]
    fn test_collecting_observer() {
        let observer = CollectingObserver::new();
        assert!(observer.is_empty());

        let run = run_info();
        observer.run_started(&run);
        observer.run_paused(&run);
        observer.run_resumed(&run);
        observer.run_completed(&run, &PipelineState::Succeeded);

        assert_eq!(
            observer.kinds(),
            vec![
                RunEventKind::Started,
                RunEventKind::Paused,
                RunEventKind::Resumed,
                RunEventKind::Succeeded
            ]
        );
        assert!(observer.events().iter().all(|e| e.run_id == run.run_id));

        observer.clear();
        assert_eq!(observer.len(), 0);
    }

    #[test]
    fn test_run_event_serializes_kind_as_snake_case() {
        let event = RunEvent {
            kind: RunEventKind::Resumed,
            run_id: Uuid::nil(),
            pipeline: "call".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "resumed");
        assert_eq!(json["pipeline"], "call");
    }
}
