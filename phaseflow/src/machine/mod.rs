//! The execution machine.
//!
//! A [`PipelineMachine`] owns one top-level run and every run forked from
//! it. Run state lives in explicit frames rather than on the call stack, so
//! a paused run can be resumed by any thread holding a clone of the
//! machine handle:
//!
//! ```rust,ignore
//! let machine = PipelineMachine::new();
//! assert!(machine.execute(request, &pipeline)?.is_executing());
//!
//! // later, from an I/O callback on another worker
//! let outcome = machine.proceed()?;
//! ```
//!
//! At most one thread steps a run at a time. A `proceed` that arrives while
//! an interceptor's turn is still being driven is banked and consumed if
//! that turn pauses; it is discarded once the turn ends without pausing.

mod driver;
mod frame;


pub(crate) use driver::{abort_stack, drive, Drive};
pub(crate) use frame::{Frame, RunFrame};
pub use frame::RunInfo;

use crate::config::MachineConfig;
use crate::core::PipelineState;
use crate::errors::{Failure, PipelineError};
use crate::events::{ExecutionObserver, NoOpObserver};
use crate::pipeline::Pipeline;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of a machine's top-level run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineStatus {
    /// No run has been started.
    Idle,
    /// A thread is stepping the run.
    Driving,
    /// The run is paused and waiting for `proceed`.
    Suspended,
    /// The run reported `Succeeded` or `Failed`.
    Completed,
}

/// Handle to an execution machine.
///
/// Cloning is cheap and every clone drives the same run.
#[derive(Clone)]
pub struct PipelineMachine {
    shared: Arc<Shared>,
}

struct Shared {
    id: Uuid,
    config: MachineConfig,
    observer: Arc<dyn ExecutionObserver>,
    run: OnceLock<RunInfo>,
    inner: Mutex<Inner>,
    completion: watch::Sender<Option<PipelineState>>,
}

struct Inner {
    status: MachineStatus,
    /// Frames of a suspended run, outermost first. Empty while driving.
    stack: Vec<Box<dyn Frame>>,
    /// A resume that arrived during the current turn. At most one.
    resume_banked: bool,
    pending_failure: Option<Failure>,
    /// Forks being driven inside an interceptor's turn.
    inline_forks: usize,
}

enum Settle {
    Resume(Vec<Box<dyn Frame>>),
    Abort(Vec<Box<dyn Frame>>, Failure),
    Suspended,
}

impl Default for PipelineMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMachine {
    /// Creates a machine with the default configuration and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for a configured machine.
    #[must_use]
    pub fn builder() -> MachineBuilder {
        MachineBuilder::default()
    }

    /// Returns the machine ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Returns the machine configuration.
    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.shared.config
    }

    /// Returns the top-level run, once started.
    #[must_use]
    pub fn run(&self) -> Option<&RunInfo> {
        self.shared.run.get()
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> MachineStatus {
        self.shared.inner.lock().status
    }

    /// Returns the terminal outcome, once the run has completed.
    #[must_use]
    pub fn outcome(&self) -> Option<PipelineState> {
        self.shared.completion.borrow().clone()
    }

    /// Runs `pipeline` with `subject` until it pauses, completes or fails.
    ///
    /// A machine runs one top-level pipeline over its lifetime.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::AlreadyStarted` if this machine already ran.
    pub fn execute<S: Send + 'static>(
        &self,
        subject: S,
        pipeline: &Pipeline<S>,
    ) -> Result<PipelineState, PipelineError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.status != MachineStatus::Idle {
                return Err(PipelineError::AlreadyStarted);
            }
            inner.status = MachineStatus::Driving;
        }

        let frame = RunFrame::new(subject, pipeline, None, self.shared.config.catch_panics);
        let info = frame.info().clone();
        debug!(
            machine_id = %self.shared.id,
            run_id = %info.run_id,
            pipeline = %info.pipeline,
            interceptors = pipeline.interceptor_count(),
            "Run started"
        );
        self.shared.observer.run_started(&info);
        let _ = self.shared.run.set(info);

        let stack: Vec<Box<dyn Frame>> = vec![Box::new(frame)];
        Ok(self.run_loop(stack))
    }

    /// Like [`execute`](Self::execute), reporting misuse as a failed run.
    pub(crate) fn start<S: Send + 'static>(
        &self,
        subject: S,
        pipeline: &Pipeline<S>,
    ) -> PipelineState {
        self.execute(subject, pipeline)
            .unwrap_or_else(|error| PipelineState::Failed(Failure::new(error)))
    }

    /// Resumes a paused run at the interceptor after the one that paused.
    ///
    /// When an interceptor's turn is still being driven, the resume is
    /// banked and this call returns `Executing`. If that turn pauses, the
    /// run continues immediately; if it ends without pausing, the resume is
    /// discarded. Repeated resumes within one turn bank only once.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotStarted` before `execute`, and
    /// `PipelineError::AlreadyCompleted` once the run has reported its
    /// outcome.
    pub fn proceed(&self) -> Result<PipelineState, PipelineError> {
        let stack = {
            let mut inner = self.shared.inner.lock();
            match inner.status {
                MachineStatus::Idle => return Err(PipelineError::NotStarted),
                MachineStatus::Completed => return Err(PipelineError::AlreadyCompleted),
                MachineStatus::Driving => {
                    inner.resume_banked = true;
                    debug!(machine_id = %self.shared.id, "Resume banked while driving");
                    return Ok(PipelineState::Executing);
                }
                MachineStatus::Suspended => {
                    inner.status = MachineStatus::Driving;
                    std::mem::take(&mut inner.stack)
                }
            }
        };

        self.resumed();
        Ok(self.run_loop(stack))
    }

    /// Fails the run from outside, e.g. when its connection timed out.
    ///
    /// A suspended run is unwound immediately, innermost frame first, and
    /// the `Failed` outcome is returned. A run that is being driven fails
    /// at its next pause; if it completes first the request is discarded
    /// with a warning and the run keeps its own outcome.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotStarted` before `execute`, and
    /// `PipelineError::AlreadyCompleted` once the run has reported its
    /// outcome.
    pub fn fail(&self, cause: impl Into<anyhow::Error>) -> Result<PipelineState, PipelineError> {
        let failure = Failure::new(cause);
        let stack = {
            let mut inner = self.shared.inner.lock();
            match inner.status {
                MachineStatus::Idle => return Err(PipelineError::NotStarted),
                MachineStatus::Completed => return Err(PipelineError::AlreadyCompleted),
                MachineStatus::Driving => {
                    match inner.pending_failure.as_mut() {
                        Some(existing) => existing.suppress(failure.into()),
                        None => inner.pending_failure = Some(failure),
                    }
                    return Ok(PipelineState::Executing);
                }
                MachineStatus::Suspended => {
                    inner.status = MachineStatus::Completed;
                    std::mem::take(&mut inner.stack)
                }
            }
        };

        debug!(machine_id = %self.shared.id, cause = %failure, "Failing suspended run");
        Ok(self.guard_panics(stack, move |stack| {
            self.finish(Err(abort_stack(std::mem::take(stack), failure)))
        }))
    }

    /// Waits for the run to report `Succeeded` or `Failed`.
    ///
    /// Resolves immediately if the run has already completed.
    pub async fn completion(&self) -> PipelineState {
        let mut receiver = self.shared.completion.subscribe();
        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(state) = current {
                return state;
            }
            // The sender lives as long as `self`.
            if receiver.changed().await.is_err() {
                return PipelineState::Executing;
            }
        }
    }

    fn run_loop(&self, stack: Vec<Box<dyn Frame>>) -> PipelineState {
        self.guard_panics(stack, |stack| self.drive_stack(stack))
    }

    /// Runs `body` over `stack`. A panic that escapes the frames
    /// (`catch_panics` off) still completes the run as `Failed`, unwinding
    /// whatever frames remain, before it is re-raised.
    fn guard_panics<F>(&self, mut stack: Vec<Box<dyn Frame>>, body: F) -> PipelineState
    where
        F: FnOnce(&mut Vec<Box<dyn Frame>>) -> PipelineState,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| body(&mut stack))) {
            Ok(state) => state,
            Err(payload) if self.outcome().is_some() => panic::resume_unwind(payload),
            Err(payload) => {
                let failure = Failure::from_panic(payload.as_ref());
                warn!(machine_id = %self.shared.id, cause = %failure, "Run panicked");
                let frames = std::mem::take(&mut stack);
                let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
                    abort_stack(frames, failure.clone())
                }));
                self.finish(Err(unwound.unwrap_or(failure)));
                panic::resume_unwind(payload)
            }
        }
    }

    fn drive_stack(&self, stack: &mut Vec<Box<dyn Frame>>) -> PipelineState {
        loop {
            match drive(stack, self) {
                Drive::Completed(result) => return self.finish(result),
                Drive::Paused => {
                    self.paused(stack.len());
                    match self.settle(std::mem::take(stack)) {
                        Settle::Resume(resumed) => {
                            self.resumed();
                            *stack = resumed;
                        }
                        Settle::Abort(frames, failure) => {
                            return self.finish(Err(abort_stack(frames, failure)));
                        }
                        Settle::Suspended => return PipelineState::Executing,
                    }
                }
            }
        }
    }

    /// Called when an interceptor's turn ends without pausing. A resume
    /// banked during that turn answered no pause and is dropped.
    pub(crate) fn turn_ended(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.inline_forks == 0 && inner.resume_banked {
            inner.resume_banked = false;
            debug!(machine_id = %self.shared.id, "Discarding resume: turn ended without pausing");
        }
    }

    /// Brackets a fork driven inside an interceptor's turn. Turns of the
    /// forked run do not end the enclosing turn.
    pub(crate) fn enter_inline_fork(&self) {
        self.shared.inner.lock().inline_forks += 1;
    }

    pub(crate) fn exit_inline_fork(&self) {
        let mut inner = self.shared.inner.lock();
        inner.inline_forks = inner.inline_forks.saturating_sub(1);
    }

    /// Decides what a paused stack does next: resume on a banked permit,
    /// fail on a pending external failure, or park until `proceed`.
    fn settle(&self, stack: Vec<Box<dyn Frame>>) -> Settle {
        let mut inner = self.shared.inner.lock();
        if let Some(failure) = inner.pending_failure.take() {
            inner.status = MachineStatus::Completed;
            return Settle::Abort(stack, failure);
        }
        if std::mem::take(&mut inner.resume_banked) {
            return Settle::Resume(stack);
        }
        inner.stack = stack;
        inner.status = MachineStatus::Suspended;
        Settle::Suspended
    }

    fn paused(&self, frames: usize) {
        if let Some(info) = self.shared.run.get() {
            debug!(run_id = %info.run_id, pipeline = %info.pipeline, frames, "Run paused");
            self.shared.observer.run_paused(info);
        }
    }

    fn resumed(&self) {
        if let Some(info) = self.shared.run.get() {
            debug!(run_id = %info.run_id, pipeline = %info.pipeline, "Run resumed");
            self.shared.observer.run_resumed(info);
        }
    }

    fn finish(&self, result: Result<(), Failure>) -> PipelineState {
        let state = match result {
            Ok(()) => PipelineState::Succeeded,
            Err(failure) => PipelineState::Failed(failure),
        };

        let discarded = {
            let mut inner = self.shared.inner.lock();
            inner.status = MachineStatus::Completed;
            inner.resume_banked = false;
            inner.inline_forks = 0;
            inner.pending_failure.take()
        };
        if let Some(failure) = discarded {
            warn!(
                machine_id = %self.shared.id,
                cause = %failure,
                outcome = %state,
                "Discarding external failure: run completed before pausing"
            );
        }

        if let Some(info) = self.shared.run.get() {
            debug!(
                run_id = %info.run_id,
                pipeline = %info.pipeline,
                outcome = %state,
                "Run finished"
            );
            self.shared.observer.run_completed(info, &state);
        }
        self.shared.completion.send_replace(Some(state.clone()));
        state
    }
}

impl fmt::Debug for PipelineMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineMachine")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipelineMachine`].
#[derive(Default)]
pub struct MachineBuilder {
    config: MachineConfig,
    observer: Option<Arc<dyn ExecutionObserver>>,
}

impl MachineBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the observer notified of run lifecycle events.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Builds the machine.
    #[must_use]
    pub fn build(self) -> PipelineMachine {
        let (completion, _) = watch::channel(None);
        PipelineMachine {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                config: self.config,
                observer: self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
                run: OnceLock::new(),
                inner: Mutex::new(Inner {
                    status: MachineStatus::Idle,
                    stack: Vec::new(),
                    resume_banked: false,
                    pending_failure: None,
                    inline_forks: 0,
                }),
                completion,
            }),
        }
    }
}
