//! Execution contexts for running interceptors.
//!
//! This module provides:
//! - The activation view passed to every interceptor
//! - Per-activation finish and failure hooks
//! - Typed attribute storage scoped to a run

mod attributes;
mod execution;
pub(crate) mod hooks;

pub use attributes::{AttributeKey, Attributes};
pub use execution::PipelineContext;
pub(crate) use execution::StepControl;
