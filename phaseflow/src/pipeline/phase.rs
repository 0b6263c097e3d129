//! Phases and the ordered phase graph.

use crate::errors::{DuplicatePhaseError, PipelineError, UnknownPhaseError};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// A named ordering slot in a pipeline.
///
/// Identity is per instance: two phases created with the same name are
/// different phases. Clones share the identity of the original.
#[derive(Clone)]
pub struct Phase {
    id: Uuid,
    name: Arc<str>,
}

impl Phase {
    /// Creates a new phase with a fresh identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Arc::from(name.into()),
        }
    }

    /// Returns the phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the phase identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Phase {}

impl Hash for Phase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Phase").field(&self.name).finish()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An ordered list of phases with relative insertion.
///
/// A phase appears at most once. Every mutation either succeeds completely
/// or leaves the graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct PhaseGraph {
    phases: Vec<Phase>,
}

impl PhaseGraph {
    /// Creates an empty phase graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a phase graph from an ordered list of phases.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePhaseError` if a phase is listed twice.
    pub fn from_phases(
        phases: impl IntoIterator<Item = Phase>,
    ) -> Result<Self, DuplicatePhaseError> {
        let mut graph = Self::new();
        for phase in phases {
            graph.add(phase)?;
        }
        Ok(graph)
    }

    /// Appends a phase at the end.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePhaseError` if the phase is already present.
    pub fn add(&mut self, phase: Phase) -> Result<(), DuplicatePhaseError> {
        self.ensure_absent(&phase)?;
        self.phases.push(phase);
        Ok(())
    }

    /// Inserts `phase` immediately before `target`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPhase` if `target` is absent, `DuplicatePhase` if
    /// `phase` is already present.
    pub fn insert_before(&mut self, target: &Phase, phase: Phase) -> Result<(), PipelineError> {
        let index = self.require(target)?;
        self.ensure_absent(&phase)?;
        self.phases.insert(index, phase);
        Ok(())
    }

    /// Inserts `phase` immediately after `target`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPhase` if `target` is absent, `DuplicatePhase` if
    /// `phase` is already present.
    pub fn insert_after(&mut self, target: &Phase, phase: Phase) -> Result<(), PipelineError> {
        let index = self.require(target)?;
        self.ensure_absent(&phase)?;
        self.phases.insert(index + 1, phase);
        Ok(())
    }

    /// Returns true if the phase is present.
    #[must_use]
    pub fn contains(&self, phase: &Phase) -> bool {
        self.position(phase).is_some()
    }

    /// Returns the position of a phase.
    #[must_use]
    pub fn position(&self, phase: &Phase) -> Option<usize> {
        self.phases.iter().position(|p| p == phase)
    }

    /// Returns the phases in their current order.
    #[must_use]
    pub fn in_order(&self) -> &[Phase] {
        &self.phases
    }

    /// Returns the phase names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.phases.iter().map(Phase::name).collect()
    }

    /// Returns the number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Returns true if the graph has no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    fn require(&self, phase: &Phase) -> Result<usize, UnknownPhaseError> {
        self.position(phase)
            .ok_or_else(|| UnknownPhaseError::new(phase.name()))
    }

    fn ensure_absent(&self, phase: &Phase) -> Result<(), DuplicatePhaseError> {
        if self.contains(phase) {
            return Err(DuplicatePhaseError::new(phase.name()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_identity_is_per_instance() {
        let a = Phase::new("Call");
        let b = Phase::new("Call");

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_add_preserves_order() {
        let graph = PhaseGraph::from_phases([
            Phase::new("Infrastructure"),
            Phase::new("Call"),
            Phase::new("Fallback"),
        ])
        .unwrap();

        assert_eq!(graph.names(), vec!["Infrastructure", "Call", "Fallback"]);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let call = Phase::new("Call");
        let mut graph = PhaseGraph::new();
        graph.add(call.clone()).unwrap();

        let err = graph.add(call).unwrap_err();
        assert_eq!(err.phase, "Call");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_insert_before_and_after() {
        let before = Phase::new("before");
        let middle = Phase::new("middle");
        let after = Phase::new("after");

        let mut graph = PhaseGraph::new();
        graph.add(middle.clone()).unwrap();
        graph.insert_before(&middle, before.clone()).unwrap();
        graph.insert_after(&middle, after.clone()).unwrap();

        assert_eq!(graph.names(), vec!["before", "middle", "after"]);
        assert_eq!(graph.position(&after), Some(2));
    }

    #[test]
    fn test_insert_relative_to_unknown_phase_leaves_graph_unchanged() {
        let known = Phase::new("known");
        let stranger = Phase::new("known");
        let mut graph = PhaseGraph::from_phases([known]).unwrap();

        let err = graph
            .insert_before(&stranger, Phase::new("new"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPhase(_)));

        let err = graph
            .insert_after(&stranger, Phase::new("new"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPhase(_)));

        assert_eq!(graph.names(), vec!["known"]);
    }

    #[test]
    fn test_insert_duplicate_relative_fails() {
        let a = Phase::new("a");
        let b = Phase::new("b");
        let mut graph = PhaseGraph::from_phases([a.clone(), b.clone()]).unwrap();

        let err = graph.insert_after(&a, b).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicatePhase(_)));
        assert_eq!(graph.names(), vec!["a", "b"]);
    }
}
