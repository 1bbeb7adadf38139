//! Tags linking positions in a document's native undo stack to journal
//! records.
//!
//! A document that took part in a multi-file record gets its undo entry
//! tagged with the record id, so the next Ctrl+Z on that document can be
//! routed to the journal instead of undoing only this one file. A record
//! that touched just the active document is tagged [`Mark::NativeOnly`].

use crate::host::Direction;
use crate::storage::RecordId;

/// Tag attached to one native undo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mark {
    /// Plain edit, nothing recorded.
    #[default]
    None,
    /// Produced by a journal operation that stayed single-document;
    /// undo natively but keep the caret.
    NativeOnly,
    /// Part of a journaled multi-file record.
    Record(RecordId),
}

impl Mark {
    pub fn record(self) -> Option<RecordId> {
        match self {
            Mark::Record(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Mark::None)
    }
}

/// Per-document mark table, keyed by undo action index.
///
/// Hosts embed one of these next to their native undo stack and forward
/// [`Document::set_mark`](crate::host::Document::set_mark) /
/// [`Document::mark`](crate::host::Document::mark) to it.
#[derive(Debug, Clone, Default)]
pub struct UndoMarks {
    /// Sorted by action index.
    marks: Vec<(usize, Mark)>,
}

impl UndoMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the action just before `undo_current` (the one the next undo
    /// would revert). Replaces a tag already at that index.
    pub fn set(&mut self, undo_current: usize, mark: Mark) {
        let Some(action) = undo_current.checked_sub(1) else {
            return;
        };
        while self.marks.last().is_some_and(|&(a, _)| a >= action) {
            self.marks.pop();
        }
        if !mark.is_none() {
            self.marks.push((action, mark));
        }
    }

    /// Tag of the action the next undo/redo would process.
    ///
    /// `undo_current` is the number of actions currently applied and
    /// `action_count` the total including redoable ones.
    pub fn get(&self, undo_current: usize, action_count: usize, direction: Direction) -> Mark {
        let action = match direction {
            Direction::Redo if undo_current < action_count => undo_current,
            Direction::Undo if undo_current > 0 => undo_current - 1,
            _ => return Mark::None,
        };
        for &(a, mark) in self.marks.iter().rev() {
            if a == action {
                return mark;
            }
            if a < action {
                break;
            }
        }
        Mark::None
    }

    /// Forget tags of actions that a new user edit discarded.
    ///
    /// Call after the edit was pushed; `action_count` includes it.
    pub fn on_modified(&mut self, action_count: usize) {
        let newest = action_count.saturating_sub(1);
        while self.marks.last().is_some_and(|&(a, _)| a >= newest) {
            self.marks.pop();
        }
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
