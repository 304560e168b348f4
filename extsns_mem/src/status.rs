use extsns_core::status::StatusSink;
use std::sync::{Arc, Mutex, PoisonError};

/// A status sink keeping every line in memory.
///
/// Clones share the same lines, so a clone can be handed to a reconciler and the original kept
/// for assertions.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStatusSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl InMemoryStatusSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any emitted line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl StatusSink for InMemoryStatusSink {
    fn status(&self, line: &str) {
        log::debug!("status: {line}");
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
