//! Testing utilities for phaseflow pipelines.
//!
//! This module provides:
//! - An order recorder for asserting interceptor and hook sequencing
//! - Ready-made interceptors that record, pause or fail
//! - Test tracing setup

mod interceptors;
mod recorder;

pub use interceptors::{failing, pausing, recording};
pub use recorder::OrderRecorder;

/// Installs a `tracing` subscriber that writes to the test output.
///
/// Filtering follows `RUST_LOG`. Safe to call from every test; only the
/// first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
