//! Run lifecycle observation.
//!
//! A host that parks a paused run on its own I/O machinery plugs in an
//! [`ExecutionObserver`] to learn when the run pauses, resumes and ends.

mod observer;

pub use observer::{
    CollectingObserver, ExecutionObserver, LoggingObserver, NoOpObserver, RunEvent, RunEventKind,
};

#[cfg(test)]
pub(crate) use observer::MockExecutionObserver;
