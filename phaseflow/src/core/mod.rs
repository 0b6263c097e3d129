//! Core domain model types for phaseflow.
//!
//! This module contains the state enums shared by the pipeline, the
//! execution contexts and the machine:
//! - Run outcomes reported to the caller of `execute`/`proceed`
//! - Per-activation execution state
//! - Fork outcomes reported to a forking interceptor

mod outcome;
mod status;

pub use outcome::ForkOutcome;
pub use status::{ExecutionState, PipelineState};
