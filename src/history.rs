//! Snapshot-based undo/redo.
//!
//! Every history-worthy action stores a full copy of the graph as it was
//! immediately before the action ran.

use crate::*;

#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    past: Vec<Graph>,
    future: Vec<Graph>,
    /// Maximum number of undo steps kept. `None` = unbounded.
    limit: Option<usize>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit: limit.filter(|max| *max > 0),
            ..Self::default()
        }
    }

    /// Records `current` as the state to return to on the next undo. Any redo
    /// history is discarded: the caller is about to mutate.
    pub fn take_snapshot(&mut self, current: &Graph) {
        self.past.push(current.clone());
        self.future.clear();

        if let Some(limit) = self.limit {
            if self.past.len() > limit {
                let overflow = self.past.len() - limit;
                self.past.drain(0..overflow);
            }
        }
    }

    /// Restores the most recent snapshot into `current`. Returns `false` when
    /// there is nothing to undo.
    pub fn undo(&mut self, current: &mut Graph) -> bool {
        let Some(previous) = self.past.pop() else {
            return false;
        };
        self.future.push(std::mem::replace(current, previous));
        true
    }

    pub fn redo(&mut self, current: &mut Graph) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        self.past.push(std::mem::replace(current, next));
        true
    }

    /// Drops the newest snapshot without restoring it and hands it back.
    /// Used to abandon a gesture whose snapshot was already taken.
    pub fn pop_snapshot(&mut self) -> Option<Graph> {
        self.past.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
