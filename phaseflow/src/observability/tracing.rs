//! Span attributes and timing for run diagnostics.
//!
//! The engine logs through `tracing`; these helpers give run-level log
//! records a consistent, OpenTelemetry-style attribute set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Span attributes for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Pipeline name.
    pub pipeline_name: String,
    /// Run ID.
    pub run_id: Option<Uuid>,
    /// Forking run ID, for nested runs.
    pub parent_run_id: Option<Uuid>,
    /// Fork nesting depth.
    pub depth: usize,
    /// Outcome, once known.
    pub outcome: Option<String>,
    /// Duration in milliseconds, once known.
    pub duration_ms: Option<f64>,
}

impl RunSpanAttributes {
    /// Creates attributes for a run.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            run_id: Some(run_id),
            ..Default::default()
        }
    }

    /// Sets the parent run ID.
    #[must_use]
    pub fn with_parent_run_id(mut self, parent_run_id: Uuid) -> Self {
        self.parent_run_id = Some(parent_run_id);
        self
    }

    /// Sets the fork depth.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Converts to OpenTelemetry attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("pipeline.name".to_string(), self.pipeline_name.clone());
        attrs.insert("pipeline.depth".to_string(), self.depth.to_string());
        if let Some(v) = self.run_id {
            attrs.insert("pipeline.run_id".to_string(), v.to_string());
        }
        if let Some(v) = self.parent_run_id {
            attrs.insert("pipeline.parent_run_id".to_string(), v.to_string());
        }
        if let Some(ref v) = self.outcome {
            attrs.insert("pipeline.outcome".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("pipeline.duration_ms".to_string(), v.to_string());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_attributes() {
        let run_id = Uuid::new_v4();
        let attrs = RunSpanAttributes::new("respond", run_id)
            .with_depth(2)
            .with_outcome("succeeded")
            .with_duration_ms(1.5);

        let otel = attrs.to_otel_attributes();
        assert_eq!(otel.get("pipeline.name"), Some(&"respond".to_string()));
        assert_eq!(otel.get("pipeline.run_id"), Some(&run_id.to_string()));
        assert_eq!(otel.get("pipeline.depth"), Some(&"2".to_string()));
        assert_eq!(otel.get("pipeline.outcome"), Some(&"succeeded".to_string()));
        assert!(!otel.contains_key("pipeline.parent_run_id"));
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("test_span");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "test_span");
        assert!(timer.elapsed_ms() >= 10.0);
    }
}
