use crate::board::CardStore;

pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Bounded, linear undo history of whole-store snapshots.
///
/// `record` is called before every user mutation and stores the state the
/// mutation is about to replace. `index` always points one past the newest
/// snapshot that undo may restore; when it reaches zero only the post-load
/// baseline is known and `undo` does nothing.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<CardStore>,
    index: usize,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries.min(128)),
            index: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    /// Drops all history; the current store becomes the new baseline.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index = 0;
    }

    pub fn record(&mut self, current: &CardStore) {
        self.entries.truncate(self.index);
        // A snapshot identical to the newest one adds nothing (cancelled drags).
        if self.entries.last() == Some(current) {
            return;
        }
        self.entries.push(current.clone());
        if self.entries.len() > self.max_entries {
            let overflow = self.entries.len() - self.max_entries;
            self.entries.drain(0..overflow);
        }
        self.index = self.entries.len();
    }

    /// Returns an independent copy of the snapshot to restore, if any.
    pub fn undo(&mut self) -> Option<CardStore> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).cloned()
    }
}
