//! Pipeline definition.
//!
//! This module provides:
//! - Phases and the ordered phase graph
//! - Pipelines binding phases to per-phase interceptor lists
//! - Standard application and respond phase sets

mod definition;
mod phase;
mod presets;

pub use definition::{Interceptor, Pipeline};
pub use phase::{Phase, PhaseGraph};
pub use presets::{
    application_call_pipeline, respond_pipeline, ApplicationPhase, RespondPhase,
};
