use parking_lot::Mutex;
use std::sync::Arc;

/// Shared, ordered log of hook invocations
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries starting with `prefix`, prefix stripped
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
