//! Error types for the phaseflow engine.
//!
//! Two families live here:
//!
//! - [`PipelineError`]: structural misuse reported synchronously to the caller
//!   (unknown or duplicate phases, driving a machine in the wrong state).
//! - [`Failure`]: the cause carried by a failing run, together with any
//!   secondary causes raised while unwinding it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for phaseflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A phase was referenced that the pipeline does not contain.
    #[error("{0}")]
    UnknownPhase(#[from] UnknownPhaseError),

    /// A phase was added to a pipeline that already contains it.
    #[error("{0}")]
    DuplicatePhase(#[from] DuplicatePhaseError),

    /// `execute` was called on a machine that already owns a run.
    #[error("Execution already started on this machine")]
    AlreadyStarted,

    /// `proceed` or `fail` was called before any run was started.
    #[error("Execution has not been started")]
    NotStarted,

    /// The run already reported a terminal outcome.
    #[error("Execution already completed")]
    AlreadyCompleted,

    /// An interceptor forked again while an earlier fork is still suspended.
    #[error("A forked execution is already suspended in this interceptor")]
    ForkPending,

    /// A fork would exceed the configured nesting limit.
    #[error("Fork depth {depth} exceeds configured limit {limit}")]
    ForkDepthExceeded {
        /// Depth the new run would have.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Invalid machine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a phase is not part of a pipeline's phase graph.
#[derive(Debug, Clone, Error)]
#[error("Phase '{phase}' is not registered in this pipeline")]
pub struct UnknownPhaseError {
    /// Name of the missing phase.
    pub phase: String,
}

impl UnknownPhaseError {
    /// Creates a new unknown phase error.
    #[must_use]
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
        }
    }
}

/// Error raised when a phase is added twice.
#[derive(Debug, Clone, Error)]
#[error("Phase '{phase}' is already registered in this pipeline")]
pub struct DuplicatePhaseError {
    /// Name of the duplicated phase.
    pub phase: String,
}

impl DuplicatePhaseError {
    /// Creates a new duplicate phase error.
    #[must_use]
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
        }
    }
}

/// The cause of a failed run.
///
/// A failure keeps its primary cause for its whole life. Errors raised by
/// `on_fail` hooks while the failure is being unwound are attached as
/// suppressed causes, in the order they were raised.
///
/// Cloning is cheap; causes are shared.
#[derive(Debug, Clone)]
pub struct Failure {
    cause: Arc<anyhow::Error>,
    suppressed: Vec<Arc<anyhow::Error>>,
}

impl Failure {
    /// Creates a failure from any error.
    ///
    /// If the error already wraps a `Failure` (for example one returned by
    /// [`fork`](crate::context::PipelineContext::fork) and propagated with
    /// `?`), that failure is returned as-is instead of being nested.
    pub fn new<E: Into<anyhow::Error>>(cause: E) -> Self {
        Self::from_error(cause.into())
    }

    /// Creates a failure from an `anyhow::Error`, unwrapping nested failures.
    #[must_use]
    pub fn from_error(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(failure) => failure,
            Err(error) => Self {
                cause: Arc::new(error),
                suppressed: Vec::new(),
            },
        }
    }

    /// Creates a failure from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::new(anyhow::anyhow!("panicked: {}", panic_message(payload)))
    }

    /// Returns the primary cause.
    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Returns the suppressed causes in the order they were raised.
    pub fn suppressed(&self) -> impl Iterator<Item = &anyhow::Error> + '_ {
        self.suppressed.iter().map(|cause| &**cause)
    }

    /// Returns the number of suppressed causes.
    #[must_use]
    pub fn suppressed_count(&self) -> usize {
        self.suppressed.len()
    }

    /// Attempts to downcast the primary cause.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.cause.downcast_ref::<E>()
    }

    /// Returns true if both failures share the same primary cause.
    #[must_use]
    pub fn same_cause(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }

    /// Attaches an error as a suppressed cause.
    ///
    /// An error that is this failure (or wraps it) is ignored; an error that
    /// wraps another failure contributes that failure's primary cause and its
    /// suppressed causes.
    pub fn suppress(&mut self, error: anyhow::Error) {
        let other = Self::from_error(error);
        if self.same_cause(&other) {
            return;
        }
        self.suppressed.push(other.cause);
        self.suppressed.extend(other.suppressed);
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_unknown_phase_error_message() {
        let err = PipelineError::from(UnknownPhaseError::new("Render"));
        assert_eq!(
            err.to_string(),
            "Phase 'Render' is not registered in this pipeline"
        );
    }

    #[test]
    fn test_failure_keeps_primary_cause() {
        let mut failure = Failure::new(anyhow!("1"));
        failure.suppress(anyhow!("2"));
        failure.suppress(anyhow!("3"));

        assert_eq!(failure.cause().to_string(), "1");
        let suppressed: Vec<String> = failure.suppressed().map(ToString::to_string).collect();
        assert_eq!(suppressed, vec!["2", "3"]);
        assert_eq!(failure.to_string(), "1 (2 suppressed)");
    }

    #[test]
    fn test_failure_round_trips_through_anyhow() {
        let failure = Failure::new(anyhow!("boom"));
        let wrapped: anyhow::Error = failure.clone().into();
        let recovered = Failure::from_error(wrapped);

        assert!(recovered.same_cause(&failure));
    }

    #[test]
    fn test_suppressing_self_is_ignored() {
        let mut failure = Failure::new(anyhow!("boom"));
        let same: anyhow::Error = failure.clone().into();
        failure.suppress(same);

        assert_eq!(failure.suppressed_count(), 0);
    }

    #[test]
    fn test_downcast_typed_cause() {
        let failure = Failure::new(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(failure.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let failure = Failure::from_panic(payload.as_ref());
        assert_eq!(failure.cause().to_string(), "panicked: owned");
    }
}
