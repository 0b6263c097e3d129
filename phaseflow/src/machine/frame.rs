//! Run frames: the explicit, thread-transferable state of one run.

use crate::context::hooks::{invoke_guarded, Activation};
use crate::context::{Attributes, PipelineContext, StepControl};
use crate::core::ExecutionState;
use crate::errors::Failure;
use crate::machine::PipelineMachine;
use crate::observability::{RunSpanAttributes, SpanTimer};
use crate::pipeline::{Interceptor, Pipeline};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    /// Unique run ID.
    pub run_id: Uuid,
    /// The forking run, for nested runs.
    pub parent_run_id: Option<Uuid>,
    /// Name of the pipeline being run.
    pub pipeline: String,
    /// Fork nesting depth; 0 for a top-level run.
    pub depth: usize,
    /// When the run started (RFC 3339).
    pub started_at: String,
}

impl RunInfo {
    fn new(pipeline: &str, parent: Option<&Self>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            parent_run_id: parent.map(|p| p.run_id),
            pipeline: pipeline.to_string(),
            depth: parent.map_or(0, |p| p.depth + 1),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Returns span attributes describing this run.
    #[must_use]
    pub fn span_attributes(&self) -> RunSpanAttributes {
        let attributes = RunSpanAttributes::new(&self.pipeline, self.run_id).with_depth(self.depth);
        match self.parent_run_id {
            Some(parent) => attributes.with_parent_run_id(parent),
            None => attributes,
        }
    }
}

/// Where a frame stopped when [`Frame::run`] returned.
pub(crate) enum FrameStatus {
    /// An interceptor paused this run.
    Paused,
    /// An interceptor forked a run that paused; the frames of the suspended
    /// forks, outermost first.
    Forked(Vec<Box<dyn Frame>>),
    /// The run completed or failed; all its hooks have fired.
    Done(Result<(), Failure>),
}

/// A run with its subject type erased, so forks of any subject type can
/// share one stack.
pub(crate) trait Frame: Send {
    /// Steps the run until it pauses, forks a suspended run, or ends.
    fn run(&mut self, machine: &PipelineMachine) -> FrameStatus;

    /// Delivers the result of a suspended fork that has now ended.
    fn child_completed(&mut self, result: Result<(), Failure>);

    /// Abandons the run, firing its fail hooks with `failure`.
    fn abort(&mut self, failure: Failure) -> Failure;

    fn info(&self) -> &RunInfo;
}

/// The state of one run of a `Pipeline<T>`.
pub(crate) struct RunFrame<T> {
    info: RunInfo,
    subject: T,
    interceptors: Arc<[Interceptor<T>]>,
    /// Next interceptor to invoke.
    index: usize,
    /// One per interceptor reached so far.
    activations: Vec<Activation>,
    attributes: Attributes,
    /// Failure to unwind on the next `run`.
    failing: Option<Failure>,
    stopped: bool,
    /// Activation whose fork is suspended.
    forked_at: Option<usize>,
    catch_panics: bool,
    timer: SpanTimer,
}

impl<T: Send + 'static> RunFrame<T> {
    pub(crate) fn new(
        subject: T,
        pipeline: &Pipeline<T>,
        parent: Option<&RunInfo>,
        catch_panics: bool,
    ) -> Self {
        let info = RunInfo::new(pipeline.name(), parent);
        let timer = SpanTimer::start(format!("run:{}", info.pipeline));
        Self {
            info,
            subject,
            interceptors: pipeline.flatten(),
            index: 0,
            activations: Vec::new(),
            attributes: Attributes::new(),
            failing: None,
            stopped: false,
            forked_at: None,
            catch_panics,
            timer,
        }
    }

    fn complete(&mut self) -> FrameStatus {
        for position in (0..self.activations.len()).rev() {
            let finished = self.activations[position].run_finish_hooks(self.catch_panics);
            if let Err(failure) = finished {
                warn!(
                    run_id = %self.info.run_id,
                    position,
                    cause = %failure,
                    "on_finish hook failed"
                );
                return FrameStatus::Done(Err(self.unwind_through(position + 1, failure)));
            }
        }
        debug!(
            span = self.timer.name(),
            attributes = ?self.finished_attributes("succeeded").to_otel_attributes(),
            "Run completed"
        );
        FrameStatus::Done(Ok(()))
    }

    /// Span attributes of this run with its outcome and elapsed time.
    fn finished_attributes(&self, outcome: &str) -> RunSpanAttributes {
        self.info
            .span_attributes()
            .with_outcome(outcome)
            .with_duration_ms(self.timer.elapsed_ms())
    }

    fn unwind(&mut self, failure: Failure) -> Failure {
        let end = self.activations.len();
        self.unwind_through(end, failure)
    }

    /// Fires the fail hooks of activations `0..end`, innermost first.
    fn unwind_through(&mut self, end: usize, mut failure: Failure) -> Failure {
        for activation in self.activations[..end].iter_mut().rev() {
            activation.run_fail_hooks(&mut failure, self.catch_panics);
        }
        for activation in &mut self.activations[end..] {
            activation.state = ExecutionState::Finished;
        }
        warn!(
            span = self.timer.name(),
            cause = %failure,
            attributes = ?self.finished_attributes("failed").to_otel_attributes(),
            "Run failed"
        );
        failure
    }
}

impl<T: Send + 'static> Frame for RunFrame<T> {
    fn run(&mut self, machine: &PipelineMachine) -> FrameStatus {
        if let Some(failure) = self.failing.take() {
            return FrameStatus::Done(Err(self.unwind(failure)));
        }

        while !self.stopped && self.index < self.interceptors.len() {
            let position = self.index;
            self.index += 1;
            let interceptor = Arc::clone(&self.interceptors[position]);
            self.activations.push(Activation::default());

            let mut control = StepControl::default();
            let result = {
                let activation = &mut self.activations[position];
                activation.state = ExecutionState::Executing;
                let mut ctx = PipelineContext::new(
                    activation,
                    &mut control,
                    &self.attributes,
                    &self.info,
                    machine,
                );
                let subject = &mut self.subject;
                invoke_guarded(self.catch_panics, || interceptor(&mut ctx, subject))
            };

            if let Err(error) = result {
                control.record_failure(Failure::from_error(error));
            }
            if let Some(failure) = control.failure.take() {
                let failure = match control.suspended.take() {
                    Some(children) => super::abort_stack(children, failure),
                    None => failure,
                };
                return FrameStatus::Done(Err(self.unwind(failure)));
            }
            if let Some(children) = control.suspended.take() {
                debug!(run_id = %self.info.run_id, position, "Fork suspended");
                self.forked_at = Some(position);
                return FrameStatus::Forked(children);
            }

            match self.activations[position].state {
                ExecutionState::Pausing => {
                    debug!(run_id = %self.info.run_id, position, "Run paused");
                    return FrameStatus::Paused;
                }
                ExecutionState::Finished => {
                    debug!(run_id = %self.info.run_id, position, "Run stopped");
                    machine.turn_ended();
                    self.stopped = true;
                }
                ExecutionState::Executing => machine.turn_ended(),
            }
        }

        self.complete()
    }

    fn child_completed(&mut self, result: Result<(), Failure>) {
        let Some(position) = self.forked_at.take() else {
            return;
        };
        let activation = &mut self.activations[position];

        if let Err(mut failure) = result {
            if activation.notify_fail_hooks(&mut failure, self.catch_panics) {
                self.failing = Some(failure);
                return;
            }
            debug!(run_id = %self.info.run_id, cause = %failure, "Recovered forked run failure");
        }

        if activation.state == ExecutionState::Finished {
            self.stopped = true;
        } else {
            activation.state = ExecutionState::Executing;
        }
    }

    fn abort(&mut self, failure: Failure) -> Failure {
        self.forked_at = None;
        self.failing = None;
        self.unwind(failure)
    }

    fn info(&self) -> &RunInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Phase;

    #[test]
    fn test_run_info_depth_follows_parent() {
        let parent = RunInfo::new("outer", None);
        let child = RunInfo::new("inner", Some(&parent));

        assert_eq!(parent.depth, 0);
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_run_id, Some(parent.run_id));

        let attributes = child.span_attributes().to_otel_attributes();
        assert_eq!(attributes.get("pipeline.name"), Some(&"inner".to_string()));
        assert_eq!(
            attributes.get("pipeline.parent_run_id"),
            Some(&parent.run_id.to_string())
        );
    }

    #[test]
    fn test_frame_creates_activations_lazily() {
        let call = Phase::new("Call");
        let mut pipeline = Pipeline::<u32>::new([call.clone()]).unwrap();
        pipeline
            .intercept(&call, |ctx, _| {
                ctx.pause();
                Ok(())
            })
            .unwrap();
        pipeline
            .intercept(&call, |_, n| {
                *n += 1;
                Ok(())
            })
            .unwrap();

        let machine = PipelineMachine::new();
        let mut frame = RunFrame::new(0, &pipeline, None, true);

        assert!(matches!(frame.run(&machine), FrameStatus::Paused));
        assert_eq!(frame.activations.len(), 1);
        assert_eq!(frame.index, 1);

        assert!(matches!(frame.run(&machine), FrameStatus::Done(Ok(()))));
        assert_eq!(frame.subject, 1);
        assert!(frame
            .activations
            .iter()
            .all(|a| a.state == ExecutionState::Finished));
    }

    #[test]
    fn test_finished_attributes_carry_outcome_and_duration() {
        let call = Phase::new("Call");
        let pipeline = Pipeline::<u32>::new([call]).unwrap().with_name("respond");
        let frame = RunFrame::new(0, &pipeline, None, true);

        assert_eq!(frame.timer.name(), "run:respond");
        let attributes = frame.finished_attributes("failed").to_otel_attributes();
        assert_eq!(attributes.get("pipeline.name"), Some(&"respond".to_string()));
        assert_eq!(attributes.get("pipeline.outcome"), Some(&"failed".to_string()));
        assert!(attributes.contains_key("pipeline.duration_ms"));
        assert_eq!(
            attributes.get("pipeline.run_id"),
            Some(&frame.info.run_id.to_string())
        );
    }
}
