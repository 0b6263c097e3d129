//! Shared, thread-safe event recorder.

use parking_lot::Mutex;
use std::sync::Arc;

/// Records labels in the order they were pushed, from any thread.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct OrderRecorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    pub fn push(&self, label: impl Into<String>) {
        self.entries.lock().push(label.into());
    }

    /// Returns the recorded labels.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of recorded labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns true if `label` was recorded at least once.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.lock().iter().any(|entry| entry == label)
    }

    /// Removes all labels.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let recorder = OrderRecorder::new();
        let clone = recorder.clone();

        recorder.push("a");
        clone.push(String::from("b"));

        assert_eq!(recorder.entries(), vec!["a", "b"]);
        assert!(clone.contains("a"));
        assert_eq!(clone.len(), 2);

        clone.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_records_across_threads() {
        let recorder = OrderRecorder::new();
        let worker = recorder.clone();
        std::thread::spawn(move || worker.push("worker"))
            .join()
            .unwrap();

        assert_eq!(recorder.entries(), vec!["worker"]);
    }
}
