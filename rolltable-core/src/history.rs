//! Roll history log

use std::sync::{Mutex, MutexGuard};

/// Thread-safe append-only log of human-readable roll strings.
///
/// One history is shared by every context of an evaluation (and, at the
/// session layer, by every program attached to one session). Writes are
/// single appends; reads take snapshots under the lock.
#[derive(Debug, Default)]
pub struct RollHistory {
    entries: Mutex<Vec<String>>,
}

impl RollHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<String>> {
        // A poisoned log is still a log; recover the guard.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append one roll line.
    pub fn record(&self, line: impl Into<String>) {
        self.entries().push(line.into());
    }

    /// The most recent roll line, if any.
    pub fn latest(&self) -> Option<String> {
        self.entries().last().cloned()
    }

    /// Every recorded line, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries().clone()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_latest() {
        let history = RollHistory::new();
        assert!(history.latest().is_none());
        assert!(history.is_empty());

        history.record("4: 1d6 (4)");
        history.record("11: 3d12 (1, 4, 6)");
        assert_eq!(history.latest().unwrap(), "11: 3d12 (1, 4, 6)");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let history = RollHistory::new();
        for i in 0..5 {
            history.record(format!("roll {}", i));
        }
        let snap = history.snapshot();
        assert_eq!(snap.len(), 5);
        assert_eq!(snap[0], "roll 0");
        assert_eq!(snap[4], "roll 4");
    }

    #[test]
    fn test_clear() {
        let history = RollHistory::new();
        history.record("x");
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
