//! Run outcome and activation state enums.

use crate::errors::Failure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The externally observable outcome of `execute` or `proceed`.
#[derive(Debug, Clone)]
pub enum PipelineState {
    /// The run reached the end of its interceptor list.
    Succeeded,
    /// The run is suspended awaiting an external `proceed`.
    Executing,
    /// The run was unwound by a failure.
    Failed(Failure),
}

impl PipelineState {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the run is suspended.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        matches!(self, Self::Executing)
    }

    /// Returns true if the run failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_executing()
    }

    /// Returns the failure, if the run failed.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Converts the outcome into the failure, if any.
    #[must_use]
    pub fn into_failure(self) -> Option<Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Executing => write!(f, "executing"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
        }
    }
}

/// The state of a single interceptor activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created but not running, or suspended by `pause`.
    Pausing,
    /// The interceptor is running, or ran and let the run continue.
    Executing,
    /// The run this activation belongs to is over, or `stop` was called.
    Finished,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::Pausing
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pausing => write!(f, "pausing"),
            Self::Executing => write!(f, "executing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_state_predicates() {
        assert!(PipelineState::Succeeded.is_terminal());
        assert!(!PipelineState::Executing.is_terminal());

        let failed = PipelineState::Failed(Failure::new(anyhow::anyhow!("boom")));
        assert!(failed.is_failed());
        assert_eq!(failed.failure().map(|f| f.cause().to_string()), Some("boom".to_string()));
        assert_eq!(failed.to_string(), "failed: boom");
    }

    #[test]
    fn test_execution_state_default_is_pausing() {
        assert_eq!(ExecutionState::default(), ExecutionState::Pausing);
    }

    #[test]
    fn test_execution_state_serialize() {
        let json = serde_json::to_string(&ExecutionState::Finished).unwrap();
        assert_eq!(json, r#""finished""#);

        let state: ExecutionState = serde_json::from_str(r#""executing""#).unwrap();
        assert_eq!(state, ExecutionState::Executing);
    }
}
