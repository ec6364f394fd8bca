//! Process-wide transfer progress board
//!
//! Workers publish label -> percent-complete updates; a UI polling loop
//! reads snapshots on a fixed interval. Writers take the lock only long
//! enough to update one entry, and readers clone the map so a slow consumer
//! never blocks in-flight transfers. Labels persist until session end so a
//! poller can show history.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ProgressBoard {
    inner: Mutex<HashMap<String, u8>>,
}

impl ProgressBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress for a transfer label, clamping to 0..=100.
    pub fn set(&self, label: &str, percent: i32) {
        let clamped = percent.clamp(0, 100) as u8;
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(label.to_string(), clamped);
    }

    /// Snapshot the current label -> percent map.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u8> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Progress for a single label, if any transfer has reported under it.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<u8> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(label)
            .copied()
    }
}
