//! Standard phase sets used by the application layer.
//!
//! Phases are shared instances, so every pipeline built from these presets
//! agrees on phase identity and interceptors can be registered against the
//! same phase values everywhere.

use super::{Phase, Pipeline};
use crate::errors::PipelineError;
use std::sync::OnceLock;

/// Phases of an application call pipeline.
pub struct ApplicationPhase;

impl ApplicationPhase {
    /// Setup shared by every call: logging, headers, call-wide state.
    #[must_use]
    pub fn infrastructure() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("Infrastructure")).clone()
    }

    /// Handling of the call itself.
    #[must_use]
    pub fn call() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("Call")).clone()
    }

    /// Runs when nothing in `Call` completed the call.
    #[must_use]
    pub fn fallback() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("Fallback")).clone()
    }

    /// All phases in pipeline order.
    #[must_use]
    pub fn all() -> [Phase; 3] {
        [Self::infrastructure(), Self::call(), Self::fallback()]
    }
}

/// Phases of a respond pipeline.
pub struct RespondPhase;

impl RespondPhase {
    /// Runs before the response value is rendered.
    #[must_use]
    pub fn before() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("Before")).clone()
    }

    /// Renders the response value.
    #[must_use]
    pub fn respond() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("Respond")).clone()
    }

    /// Runs after the response value was rendered.
    #[must_use]
    pub fn after() -> Phase {
        static PHASE: OnceLock<Phase> = OnceLock::new();
        PHASE.get_or_init(|| Phase::new("After")).clone()
    }

    /// All phases in pipeline order.
    #[must_use]
    pub fn all() -> [Phase; 3] {
        [Self::before(), Self::respond(), Self::after()]
    }
}

/// Creates a pipeline with the `Infrastructure`, `Call`, `Fallback` phases.
///
/// # Errors
///
/// Never fails for the built-in phase set; the signature mirrors
/// [`Pipeline::new`].
pub fn application_call_pipeline<T: Send + 'static>() -> Result<Pipeline<T>, PipelineError> {
    Ok(Pipeline::new(ApplicationPhase::all())?.with_name("application-call"))
}

/// Creates a pipeline with the `Before`, `Respond`, `After` phases.
///
/// # Errors
///
/// Never fails for the built-in phase set; the signature mirrors
/// [`Pipeline::new`].
pub fn respond_pipeline<T: Send + 'static>() -> Result<Pipeline<T>, PipelineError> {
    Ok(Pipeline::new(RespondPhase::all())?.with_name("respond"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_preset_phases_share_identity() {
        assert_eq!(ApplicationPhase::call(), ApplicationPhase::call());
        assert_ne!(ApplicationPhase::call(), Phase::new("Call"));
    }

    #[test]
    fn test_application_call_pipeline_order() {
        let pipeline = application_call_pipeline::<String>().unwrap();
        assert_eq!(
            pipeline.phases().names(),
            vec!["Infrastructure", "Call", "Fallback"]
        );
        assert_eq!(pipeline.name(), "application-call");
    }

    #[test]
    fn test_fallback_runs_after_call() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = application_call_pipeline::<String>().unwrap();

        let fallback_log = Arc::clone(&log);
        pipeline
            .intercept(&ApplicationPhase::fallback(), move |_, _| {
                fallback_log.lock().push("fallback");
                Ok(())
            })
            .unwrap();
        let call_log = Arc::clone(&log);
        pipeline
            .intercept(&ApplicationPhase::call(), move |_, _| {
                call_log.lock().push("call");
                Ok(())
            })
            .unwrap();

        assert!(pipeline.execute("GET /".to_string()).is_succeeded());
        assert_eq!(*log.lock(), vec!["call", "fallback"]);
    }

    #[test]
    fn test_respond_pipeline_rejects_application_phases() {
        let mut pipeline = respond_pipeline::<String>().unwrap();
        assert_eq!(pipeline.phases().names(), vec!["Before", "Respond", "After"]);

        let err = pipeline
            .intercept(&ApplicationPhase::call(), |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPhase(_)));
    }
}
