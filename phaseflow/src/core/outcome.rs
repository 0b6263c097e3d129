//! Result of a `fork` as seen by the forking interceptor.

use crate::errors::Failure;

/// What happened to a forked run by the time `fork` returned.
#[derive(Debug, Clone)]
#[must_use]
pub enum ForkOutcome {
    /// The forked run succeeded, including its finish hooks.
    Completed,
    /// The forked run failed and the forking activation's `on_fail` hooks
    /// handled the failure without re-raising it.
    Recovered(Failure),
    /// The forked run paused. The forking interceptor should return; the
    /// parent run continues at its next interceptor once the fork completes.
    Suspended,
}

impl ForkOutcome {
    /// Returns true if the fork ran to completion without failing.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the fork is still suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended)
    }

    /// Returns the recovered failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Recovered(failure) => Some(failure),
            _ => None,
        }
    }
}
