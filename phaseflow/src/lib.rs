//! # Phaseflow
//!
//! A phased interceptor execution engine.
//!
//! A [`Pipeline`](pipeline::Pipeline) is an ordered set of phases, each
//! hosting interceptors that process a mutable subject. Running a pipeline
//! on a [`PipelineMachine`](machine::PipelineMachine) walks its interceptors
//! in phase order, with support for:
//!
//! - **Pause and resume**: an interceptor suspends the run; any thread
//!   holding the machine handle resumes it later
//! - **Forking**: an interceptor runs a nested pipeline on another subject
//!   and observes its failure through its own hooks
//! - **Scoped cleanup**: finish and fail hooks fire last registered first
//!   across the whole run, like nested scope exit
//! - **Failure chaining**: errors raised while unwinding are kept as
//!   suppressed causes of the original failure
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use phaseflow::prelude::*;
//!
//! let mut pipeline = application_call_pipeline::<Call>();
//! pipeline.intercept(&ApplicationPhase::call(), |ctx, call| {
//!     ctx.on_finish(|| Ok(()));
//!     call.respond("hello");
//!     Ok(())
//! })?;
//!
//! let machine = PipelineMachine::new();
//! match machine.execute(call, &pipeline)? {
//!     PipelineState::Succeeded => {}
//!     PipelineState::Executing => { /* resume later with machine.proceed() */ }
//!     PipelineState::Failed(failure) => return Err(failure.into()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod interceptors;
pub mod machine;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::MachineConfig;
    pub use crate::context::{AttributeKey, Attributes, PipelineContext};
    pub use crate::core::{ExecutionState, ForkOutcome, PipelineState};
    pub use crate::errors::{DuplicatePhaseError, Failure, PipelineError, UnknownPhaseError};
    pub use crate::events::{ExecutionObserver, LoggingObserver, NoOpObserver};
    pub use crate::interceptors::{Interceptable0, Interceptable1, Interceptable2};
    pub use crate::machine::{MachineBuilder, MachineStatus, PipelineMachine, RunInfo};
    pub use crate::pipeline::{
        application_call_pipeline, respond_pipeline, ApplicationPhase, Interceptor, Phase,
        PhaseGraph, Pipeline, RespondPhase,
    };
}
