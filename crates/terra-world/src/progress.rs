//! Shared human-readable progress text for loading screens.

use std::sync::Arc;

use parking_lot::Mutex;

/// Progress message shared between the world worker and the UI.
#[derive(Debug, Clone, Default)]
pub struct ProgressMessage(Arc<Mutex<String>>);

impl ProgressMessage {
    /// Creates a message with initial text.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self(Arc::new(Mutex::new(text.to_string())))
    }

    /// Replaces the text.
    pub fn set(&self, text: &str) {
        let mut guard = self.0.lock();
        guard.clear();
        guard.push_str(text);
    }

    /// Current text.
    #[must_use]
    pub fn get(&self) -> String {
        self.0.lock().clone()
    }
}
