//! Machine configuration.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`PipelineMachine`](crate::machine::PipelineMachine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Convert panics in interceptors and hooks into failures.
    pub catch_panics: bool,
    /// Maximum fork nesting depth. `None` means unbounded.
    pub max_fork_depth: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            max_fork_depth: None,
        }
    }
}

impl MachineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether panics are converted into failures.
    #[must_use]
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Limits fork nesting depth.
    #[must_use]
    pub fn with_max_fork_depth(mut self, depth: usize) -> Self {
        self.max_fork_depth = Some(depth);
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the JSON is malformed or invalid.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Io` if the file cannot be read, or
    /// `PipelineError::Config` if its content is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if `max_fork_depth` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_fork_depth == Some(0) {
            return Err(PipelineError::Config(
                "max_fork_depth must be at least 1; omit it for no limit".to_string(),
            ));
        }
        Ok(())
    }
}
