//! Pipeline definition: a phase graph plus per-phase interceptors.

use super::{Phase, PhaseGraph};
use crate::context::PipelineContext;
use crate::core::PipelineState;
use crate::errors::{PipelineError, UnknownPhaseError};
use crate::machine::PipelineMachine;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered interceptor function.
///
/// Receives its activation context and the run's subject. Returning `Err`
/// fails the run with that error as the cause.
pub type Interceptor<T> =
    Arc<dyn Fn(&mut PipelineContext<'_, T>, &mut T) -> anyhow::Result<()> + Send + Sync>;

/// A reusable definition of phases and interceptors for a subject type.
///
/// A pipeline is built once and executed many times; each execution is an
/// independent run owned by a [`PipelineMachine`].
pub struct Pipeline<T> {
    /// Name used in diagnostics.
    name: String,
    /// Phase ordering.
    phases: PhaseGraph,
    /// Interceptors per phase, in registration order.
    interceptors: HashMap<Phase, Vec<Interceptor<T>>>,
    /// Flattened interceptor list, cleared on any mutation.
    flattened: RwLock<Option<Arc<[Interceptor<T>]>>>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Creates a pipeline seeded with an ordered list of phases.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePhase` if a phase is listed twice.
    pub fn new(phases: impl IntoIterator<Item = Phase>) -> Result<Self, PipelineError> {
        Ok(Self {
            name: "pipeline".to_string(),
            phases: PhaseGraph::from_phases(phases)?,
            interceptors: HashMap::new(),
            flattened: RwLock::new(None),
        })
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the phase graph.
    #[must_use]
    pub fn phases(&self) -> &PhaseGraph {
        &self.phases
    }

    /// Appends a phase.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePhase` if the phase is already present.
    pub fn add_phase(&mut self, phase: Phase) -> Result<(), PipelineError> {
        self.phases.add(phase)?;
        self.invalidate();
        Ok(())
    }

    /// Inserts a phase before an existing one.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPhase` if `target` is absent, `DuplicatePhase` if
    /// `phase` is already present.
    pub fn insert_phase_before(
        &mut self,
        target: &Phase,
        phase: Phase,
    ) -> Result<(), PipelineError> {
        self.phases.insert_before(target, phase)?;
        self.invalidate();
        Ok(())
    }

    /// Inserts a phase after an existing one.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPhase` if `target` is absent, `DuplicatePhase` if
    /// `phase` is already present.
    pub fn insert_phase_after(
        &mut self,
        target: &Phase,
        phase: Phase,
    ) -> Result<(), PipelineError> {
        self.phases.insert_after(target, phase)?;
        self.invalidate();
        Ok(())
    }

    /// Registers an interceptor at the end of a phase.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPhase` if the phase was never added to this pipeline.
    pub fn intercept<F>(&mut self, phase: &Phase, interceptor: F) -> Result<(), PipelineError>
    where
        F: Fn(&mut PipelineContext<'_, T>, &mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if !self.phases.contains(phase) {
            return Err(UnknownPhaseError::new(phase.name()).into());
        }
        self.interceptors
            .entry(phase.clone())
            .or_default()
            .push(Arc::new(interceptor));
        self.invalidate();
        Ok(())
    }

    /// Returns the number of interceptors registered in a phase.
    #[must_use]
    pub fn interceptors_in(&self, phase: &Phase) -> usize {
        self.interceptors.get(phase).map_or(0, Vec::len)
    }

    /// Returns the total number of registered interceptors.
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.values().map(Vec::len).sum()
    }

    /// Returns true if no interceptors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptor_count() == 0
    }

    /// Runs the pipeline to its first suspension point on a fresh machine.
    ///
    /// Use [`PipelineMachine::execute`] directly when the run may pause and
    /// needs to be resumed later.
    pub fn execute(&self, subject: T) -> PipelineState {
        PipelineMachine::new().start(subject, self)
    }

    /// Returns the interceptors of all phases, phases in graph order.
    pub(crate) fn flatten(&self) -> Arc<[Interceptor<T>]> {
        if let Some(cached) = self.flattened.read().as_ref() {
            return Arc::clone(cached);
        }

        let flattened: Arc<[Interceptor<T>]> = self
            .phases
            .in_order()
            .iter()
            .filter_map(|phase| self.interceptors.get(phase))
            .flat_map(|list| list.iter().cloned())
            .collect();
        *self.flattened.write() = Some(Arc::clone(&flattened));
        flattened
    }

    fn invalidate(&mut self) {
        *self.flattened.get_mut() = None;
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("phases", &self.phases.names())
            .field(
                "interceptors",
                &self.interceptors.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
