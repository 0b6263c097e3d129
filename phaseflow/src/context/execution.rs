//! The activation view handed to a running interceptor.

use super::hooks::Activation;
use super::Attributes;
use crate::core::{ExecutionState, ForkOutcome};
use crate::errors::{Failure, PipelineError};
use crate::machine::{drive, Drive, Frame, PipelineMachine, RunFrame, RunInfo};
use crate::pipeline::Pipeline;
use std::marker::PhantomData;
use tracing::debug;

/// Requests an interceptor made during its turn, read by the run frame once
/// the interceptor returns.
#[derive(Default)]
pub(crate) struct StepControl {
    pub(crate) failure: Option<Failure>,
    pub(crate) suspended: Option<Vec<Box<dyn Frame>>>,
}

impl StepControl {
    pub(crate) fn record_failure(&mut self, failure: Failure) {
        match self.failure.as_mut() {
            Some(existing) => existing.suppress(failure.into()),
            None => self.failure = Some(failure),
        }
    }
}

/// The control surface of one interceptor activation.
///
/// A context is only valid for the duration of the interceptor call. To
/// resume a paused run later, possibly from another thread, keep the handle
/// returned by [`machine`](Self::machine) and call
/// [`PipelineMachine::proceed`] on it.
pub struct PipelineContext<'a, T> {
    activation: &'a mut Activation,
    control: &'a mut StepControl,
    attributes: &'a Attributes,
    run: &'a RunInfo,
    machine: &'a PipelineMachine,
    _subject: PhantomData<fn(&mut T)>,
}

impl<'a, T> PipelineContext<'a, T> {
    pub(crate) fn new(
        activation: &'a mut Activation,
        control: &'a mut StepControl,
        attributes: &'a Attributes,
        run: &'a RunInfo,
        machine: &'a PipelineMachine,
    ) -> Self {
        Self {
            activation,
            control,
            attributes,
            run,
            machine,
            _subject: PhantomData,
        }
    }

    /// Returns the state of this activation.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.activation.state
    }

    /// Suspends the run once this interceptor returns.
    ///
    /// The caller of `execute`/`proceed` receives `Executing`. A later
    /// `proceed` on the machine resumes at the next interceptor.
    pub fn pause(&mut self) {
        self.activation.state = ExecutionState::Pausing;
    }

    /// Continues with the next interceptor once this one returns.
    ///
    /// This is the default; calling it rescinds a `pause` made earlier in the
    /// same turn.
    pub fn proceed(&mut self) {
        self.activation.state = ExecutionState::Executing;
    }

    /// Ends the current run after this interceptor without failing it.
    ///
    /// Remaining interceptors of this run are skipped; finish hooks fire as
    /// if the run had reached its end.
    pub fn stop(&mut self) {
        self.activation.state = ExecutionState::Finished;
    }

    /// Fails the run with `cause` once this interceptor returns.
    ///
    /// Calling it again, or returning an error as well, attaches the further
    /// causes as suppressed causes of the first.
    pub fn fail(&mut self, cause: impl Into<anyhow::Error>) {
        self.control.record_failure(Failure::new(cause));
    }

    /// Registers a hook for successful completion of the run.
    ///
    /// Hooks fire last registered first, across all activations of the run.
    pub fn on_finish<F>(&mut self, hook: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.activation.on_finish(Box::new(hook));
    }

    /// Registers a hook for failure of the run.
    ///
    /// The hook receives the cause. Errors it returns are attached to the
    /// cause as suppressed causes.
    pub fn on_fail<F>(&mut self, hook: F)
    where
        F: FnOnce(&Failure) -> anyhow::Result<()> + Send + 'static,
    {
        self.activation.on_fail(Box::new(hook));
    }

    /// Runs `pipeline` with `subject` as a nested run.
    ///
    /// The nested run executes on the current thread until it completes or
    /// pauses. If it fails, this activation's `on_fail` hooks receive the
    /// cause; the failure is recovered unless one of them raises, in which
    /// case `Err` is returned and this run fails too.
    ///
    /// # Errors
    ///
    /// Returns the failure when it was re-raised by a hook, when a previous
    /// fork of this activation is still suspended, or when the configured
    /// fork depth would be exceeded. The same failure is recorded for the
    /// run, so propagating it with `?` is optional. A fork requested after
    /// [`fail`](Self::fail) in the same turn is not run; the recorded
    /// failure is returned instead.
    pub fn fork<S: Send + 'static>(
        &mut self,
        subject: S,
        pipeline: &Pipeline<S>,
    ) -> Result<ForkOutcome, Failure> {
        if let Some(failure) = self.control.failure.as_ref() {
            debug!(run_id = %self.run.run_id, cause = %failure, "Skipping fork of failing run");
            return Err(failure.clone());
        }
        if self.control.suspended.is_some() {
            return Err(self.reject(PipelineError::ForkPending));
        }
        let depth = self.run.depth + 1;
        if let Some(limit) = self.machine.config().max_fork_depth {
            if depth > limit {
                return Err(self.reject(PipelineError::ForkDepthExceeded { depth, limit }));
            }
        }

        let catch_panics = self.machine.config().catch_panics;
        let frame = RunFrame::new(subject, pipeline, Some(self.run), catch_panics);
        debug!(
            parent_run_id = %self.run.run_id,
            child_run_id = %frame.info().run_id,
            pipeline = %pipeline.name(),
            depth,
            "Forking run"
        );

        let mut stack: Vec<Box<dyn Frame>> = vec![Box::new(frame)];
        self.machine.enter_inline_fork();
        let driven = drive(&mut stack, self.machine);
        self.machine.exit_inline_fork();
        match driven {
            Drive::Paused => {
                self.activation.state = ExecutionState::Pausing;
                self.control.suspended = Some(stack);
                Ok(ForkOutcome::Suspended)
            }
            Drive::Completed(Ok(())) => Ok(ForkOutcome::Completed),
            Drive::Completed(Err(mut failure)) => {
                if self.activation.notify_fail_hooks(&mut failure, catch_panics) {
                    self.control.record_failure(failure.clone());
                    Err(failure)
                } else {
                    debug!(
                        run_id = %self.run.run_id,
                        cause = %failure,
                        "Recovered forked run failure"
                    );
                    Ok(ForkOutcome::Recovered(failure))
                }
            }
        }
    }

    /// Returns a handle to the machine driving this run.
    #[must_use]
    pub fn machine(&self) -> PipelineMachine {
        self.machine.clone()
    }

    /// Returns the attributes of this run.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        self.attributes
    }

    /// Returns information about this run.
    #[must_use]
    pub fn run(&self) -> &RunInfo {
        self.run
    }

    fn reject(&mut self, error: PipelineError) -> Failure {
        let failure = Failure::new(error);
        self.control.record_failure(failure.clone());
        failure
    }
}
