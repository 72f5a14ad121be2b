//! Undo/redo snapshot stacks
//!
//! Linear history: saving after an undo drops the redo branch. Consecutive
//! equal snapshots are collapsed with a structured comparison.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::audio::Instrument;
use crate::consts::HISTORY_CAPACITY;
use crate::persistence::{BarRecord, PlaceholderRecord, SceneFile, SpawnerRecord};

/// Everything an undo step restores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub name: String,
    /// Restored with the rest, so undoing a readonly import unlocks editing
    pub readonly: bool,
    pub gravity: f32,
    pub bounce: f32,
    pub instrument: Instrument,
    pub spawners: Vec<SpawnerRecord>,
    pub placeholders: Vec<PlaceholderRecord>,
    pub bars: Vec<BarRecord>,
}

impl From<&SceneFile> for SceneSnapshot {
    fn from(file: &SceneFile) -> Self {
        Self {
            name: file.name.clone(),
            readonly: file.readonly,
            gravity: file.gravity,
            bounce: file.bounce,
            instrument: file.instrument,
            spawners: file.spawners.clone(),
            placeholders: file.placeholders.clone(),
            bars: file.bars.clone(),
        }
    }
}

/// Bounded undo stack plus redo stack
#[derive(Debug)]
pub struct History {
    undo: VecDeque<SceneSnapshot>,
    redo: Vec<SceneSnapshot>,
    capacity: usize,
}

impl History {
    /// Start a history whose base entry is `initial`
    pub fn new(initial: SceneSnapshot) -> Self {
        Self::with_capacity(initial, HISTORY_CAPACITY)
    }

    pub fn with_capacity(initial: SceneSnapshot, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut undo = VecDeque::with_capacity(capacity);
        undo.push_back(initial);
        Self {
            undo,
            redo: Vec::new(),
            capacity,
        }
    }

    /// Record a state; returns false when it equals the current top
    pub fn save(&mut self, snapshot: SceneSnapshot) -> bool {
        if self.undo.back() == Some(&snapshot) {
            return false;
        }
        self.redo.clear();
        self.undo.push_back(snapshot);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
        true
    }

    /// Step back; returns the snapshot to restore
    pub fn undo(&mut self) -> Option<&SceneSnapshot> {
        if self.undo.len() <= 1 {
            return None;
        }
        let top = self.undo.pop_back()?;
        self.redo.push(top);
        self.undo.back()
    }

    /// Step forward again; returns the snapshot to restore
    pub fn redo(&mut self) -> Option<&SceneSnapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(next);
        self.undo.back()
    }

    /// Top of the undo stack
    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.undo.back()
    }

    /// Entries on the undo stack (including the base)
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.undo.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Forget everything and start over from `initial`
    pub fn reset(&mut self, initial: SceneSnapshot) {
        self.undo.clear();
        self.redo.clear();
        self.undo.push_back(initial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(gravity: f32) -> SceneSnapshot {
        SceneSnapshot {
            name: "Untitled".to_string(),
            readonly: false,
            gravity,
            bounce: 0.5,
            instrument: Instrument::Marimba,
            spawners: vec![SpawnerRecord {
                x: 0.0,
                y: 0.0,
                r: 10.0,
                delay: 0,
            }],
            placeholders: Vec::new(),
            bars: Vec::new(),
        }
    }

    #[test]
    fn test_duplicate_save_collapsed() {
        let mut h = History::new(snapshot(1.0));
        assert!(h.save(snapshot(2.0)));
        assert!(!h.save(snapshot(2.0)));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_undo_with_only_base_is_noop() {
        let mut h = History::new(snapshot(1.0));
        assert!(h.undo().is_none());
        assert_eq!(h.len(), 1);
        assert!(!h.can_redo());
    }

    #[test]
    fn test_undo_redo_restore_same_content() {
        let mut h = History::new(snapshot(1.0));
        h.save(snapshot(2.0));
        h.save(snapshot(3.0));

        assert_eq!(h.undo().map(|s| s.gravity), Some(2.0));
        assert_eq!(h.undo().map(|s| s.gravity), Some(1.0));
        assert!(h.undo().is_none());
        assert_eq!(h.redo().map(|s| s.gravity), Some(2.0));
        assert_eq!(h.redo().map(|s| s.gravity), Some(3.0));
        assert!(h.redo().is_none());
        assert_eq!(h.current(), Some(&snapshot(3.0)));
    }

    #[test]
    fn test_save_after_undo_clears_redo() {
        let mut h = History::new(snapshot(1.0));
        h.save(snapshot(2.0));
        h.undo();
        assert!(h.can_redo());
        h.save(snapshot(5.0));
        assert!(!h.can_redo());
        assert!(h.redo().is_none());
    }

    #[test]
    fn test_deduped_save_keeps_redo() {
        let mut h = History::new(snapshot(1.0));
        h.save(snapshot(2.0));
        h.undo();
        assert!(!h.save(snapshot(1.0)));
        assert!(h.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut h = History::new(snapshot(0.0));
        for i in 1..=HISTORY_CAPACITY {
            h.save(snapshot(i as f32));
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        // Base entry was evicted by the 51st push
        let mut oldest = None;
        while let Some(s) = h.undo() {
            oldest = Some(s.gravity);
        }
        assert_eq!(oldest, Some(1.0));
    }

    proptest! {
        #[test]
        fn prop_history_bounded(values in prop::collection::vec(0u8..20, 0..200)) {
            let mut h = History::new(snapshot(-1.0));
            for v in values {
                if v == 0 {
                    h.undo();
                } else if v == 1 {
                    h.redo();
                } else {
                    h.save(snapshot(v as f32));
                }
                prop_assert!(h.len() >= 1);
                prop_assert!(h.len() <= HISTORY_CAPACITY);
            }
        }

        #[test]
        fn prop_undo_then_redo_is_identity(count in 1usize..30, back in 1usize..30) {
            let mut h = History::new(snapshot(0.0));
            for i in 1..=count {
                h.save(snapshot(i as f32));
            }
            let before = h.current().cloned();
            let steps = back.min(count);
            for _ in 0..steps {
                h.undo();
            }
            for _ in 0..steps {
                h.redo();
            }
            prop_assert_eq!(h.current().cloned(), before);
        }
    }
}
