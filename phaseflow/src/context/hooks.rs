//! Per-activation finish and failure hooks.

use crate::core::ExecutionState;
use crate::errors::Failure;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// A hook run when the owning run completes successfully.
pub(crate) type FinishHook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// A hook run with the cause when the owning run fails.
pub(crate) type FailHook = Box<dyn FnOnce(&Failure) -> anyhow::Result<()> + Send>;

/// The activation record of one interceptor within a run.
///
/// Hooks are kept in registration order and drained in reverse. Each hook
/// fires at most once.
#[derive(Default)]
pub(crate) struct Activation {
    pub(crate) state: ExecutionState,
    exits: Vec<FinishHook>,
    failures: Vec<FailHook>,
}

impl Activation {
    pub(crate) fn on_finish(&mut self, hook: FinishHook) {
        self.exits.push(hook);
    }

    pub(crate) fn on_fail(&mut self, hook: FailHook) {
        self.failures.push(hook);
    }

    /// Runs the finish hooks, last registered first.
    ///
    /// Stops at the first hook that fails; the remaining finish hooks are
    /// dropped and the error is returned as a new failure. Fail hooks are
    /// dropped on success.
    pub(crate) fn run_finish_hooks(&mut self, catch_panics: bool) -> Result<(), Failure> {
        let exits = std::mem::take(&mut self.exits);
        for hook in exits.into_iter().rev() {
            if let Err(error) = invoke_guarded(catch_panics, hook) {
                return Err(Failure::from_error(error));
            }
        }
        self.failures.clear();
        self.state = ExecutionState::Finished;
        Ok(())
    }

    /// Runs the fail hooks, last registered first.
    ///
    /// Errors raised by hooks are attached to `failure` as suppressed causes.
    /// Returns true if any hook raised. Finish hooks are dropped.
    pub(crate) fn run_fail_hooks(&mut self, failure: &mut Failure, catch_panics: bool) -> bool {
        self.exits.clear();
        let raised = self.notify_fail_hooks(failure, catch_panics);
        self.state = ExecutionState::Finished;
        raised
    }

    /// Runs the fail hooks for a failure that may still be recovered.
    ///
    /// Unlike [`run_fail_hooks`](Self::run_fail_hooks) the finish hooks and
    /// the state are left untouched.
    pub(crate) fn notify_fail_hooks(&mut self, failure: &mut Failure, catch_panics: bool) -> bool {
        let failures = std::mem::take(&mut self.failures);
        let mut raised = false;
        for hook in failures.into_iter().rev() {
            let current = failure.clone();
            if let Err(error) = invoke_guarded(catch_panics, move || hook(&current)) {
                warn!(error = %error, cause = %failure.cause(), "on_fail hook raised");
                failure.suppress(error);
                raised = true;
            }
        }
        raised
    }

    #[cfg(test)]
    pub(crate) fn pending_hooks(&self) -> usize {
        self.exits.len() + self.failures.len()
    }
}

/// Invokes user code, turning a panic into an error when `catch_panics` is set.
pub(crate) fn invoke_guarded<R>(
    catch_panics: bool,
    body: impl FnOnce() -> anyhow::Result<R>,
) -> anyhow::Result<R> {
    if !catch_panics {
        return body();
    }
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(Failure::from_panic(payload.as_ref()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn push(log: &Arc<Mutex<Vec<i32>>>, value: i32) -> FinishHook {
        let log = Arc::clone(log);
        Box::new(move || -> anyhow::Result<()> {
            log.lock().push(value);
            Ok(())
        })
    }

    #[test]
    fn test_finish_hooks_lifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut activation = Activation::default();
        activation.on_finish(push(&log, 1));
        activation.on_finish(push(&log, 2));
        activation.on_finish(push(&log, 3));

        activation.run_finish_hooks(true).unwrap();
        assert_eq!(*log.lock(), vec![3, 2, 1]);
        assert_eq!(activation.state, ExecutionState::Finished);
        assert_eq!(activation.pending_hooks(), 0);
    }

    #[test]
    fn test_failing_finish_hook_stops_remaining() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut activation = Activation::default();
        activation.on_finish(push(&log, 1));
        activation.on_finish(Box::new(|| -> anyhow::Result<()> {
            Err(anyhow!("finish failed"))
        }));

        let failure = activation.run_finish_hooks(true).unwrap_err();
        assert_eq!(failure.cause().to_string(), "finish failed");
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_fail_hooks_collect_suppressed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut activation = Activation::default();

        let outer_seen = Arc::clone(&seen);
        activation.on_fail(Box::new(move |failure: &Failure| -> anyhow::Result<()> {
            outer_seen.lock().push(failure.suppressed_count());
            Ok(())
        }));
        activation.on_fail(Box::new(|_: &Failure| -> anyhow::Result<()> {
            Err(anyhow!("2"))
        }));

        let mut failure = Failure::new(anyhow!("1"));
        assert!(activation.run_fail_hooks(&mut failure, true));
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(failure.cause().to_string(), "1");
    }

    #[test]
    fn test_panicking_hook_is_caught() {
        let mut activation = Activation::default();
        activation.on_fail(Box::new(|_: &Failure| -> anyhow::Result<()> {
            panic!("hook exploded")
        }));

        let mut failure = Failure::new(anyhow!("cause"));
        assert!(activation.run_fail_hooks(&mut failure, true));
        let suppressed: Vec<String> = failure.suppressed().map(ToString::to_string).collect();
        assert_eq!(suppressed, vec!["panicked: hook exploded"]);
    }
}
