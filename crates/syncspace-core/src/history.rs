//! Undo/redo as a log of invertible commands.
//!
//! The log only stores what happened. Applying an entry (and pushing it
//! through sync) is the session's job, the same as for a fresh edit.

use crate::shapes::{ShapeId, ShapePatch};
use crate::store::Removed;
use std::collections::HashMap;

/// Most entries kept on the undo stack.
pub const MAX_HISTORY: usize = 100;

/// One shape's patch, with the patch that reverts it.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchChange {
    pub id: ShapeId,
    pub before: ShapePatch,
    pub after: ShapePatch,
}

/// A user-level mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Shapes that appeared, with the position they were given.
    Add(Vec<Removed>),
    /// Shapes that were removed, with the position they held.
    Delete(Vec<Removed>),
    Patch(Vec<PatchChange>),
    Reorder { before: Vec<ShapeId>, after: Vec<ShapeId> },
}

impl Edit {
    /// The edit that undoes this one.
    pub fn inverse(&self) -> Edit {
        match self {
            Edit::Add(items) => Edit::Delete(items.clone()),
            Edit::Delete(items) => Edit::Add(items.clone()),
            Edit::Patch(changes) => Edit::Patch(
                changes
                    .iter()
                    .rev()
                    .map(|c| PatchChange {
                        id: c.id.clone(),
                        before: c.after.clone(),
                        after: c.before.clone(),
                    })
                    .collect(),
            ),
            Edit::Reorder { before, after } => Edit::Reorder {
                before: after.clone(),
                after: before.clone(),
            },
        }
    }

    /// Rewrite every id found in `ids` to its mapped value.
    pub fn remap_ids(&mut self, ids: &HashMap<ShapeId, ShapeId>) {
        let remap = |id: &mut ShapeId| {
            if let Some(new) = ids.get(id) {
                *id = new.clone();
            }
        };
        match self {
            Edit::Add(items) | Edit::Delete(items) => {
                items.iter_mut().for_each(|r| remap(&mut r.shape.id));
            }
            Edit::Patch(changes) => changes.iter_mut().for_each(|c| remap(&mut c.id)),
            Edit::Reorder { before, after } => {
                before.iter_mut().chain(after.iter_mut()).for_each(remap);
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Edit::Add(items) | Edit::Delete(items) => items.is_empty(),
            Edit::Patch(changes) => changes.is_empty(),
            Edit::Reorder { before, after } => before == after,
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Edit>,
    redo: Vec<Edit>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh edit. Clears anything that could be redone.
    pub fn record(&mut self, edit: Edit) {
        if edit.is_empty() {
            return;
        }
        self.redo.clear();
        self.undo.push(edit);
        if self.undo.len() > MAX_HISTORY {
            self.undo.remove(0);
        }
    }

    /// Pop the last edit and return what must be applied to revert it.
    pub fn undo(&mut self) -> Option<Edit> {
        let edit = self.undo.pop()?;
        let inverse = edit.inverse();
        self.redo.push(edit);
        Some(inverse)
    }

    /// Return the most recently undone edit so it can be applied again.
    pub fn redo(&mut self) -> Option<Edit> {
        let edit = self.redo.pop()?;
        self.undo.push(edit.clone());
        Some(edit)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Re-key recorded edits after temporary ids were replaced.
    pub fn remap_ids(&mut self, ids: &HashMap<ShapeId, ShapeId>) {
        if ids.is_empty() {
            return;
        }
        for edit in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            edit.remap_ids(ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotate(id: &str, from: f64, to: f64) -> Edit {
        Edit::Patch(vec![PatchChange {
            id: ShapeId::new(id),
            before: ShapePatch::Rotate { rotation: from },
            after: ShapePatch::Rotate { rotation: to },
        }])
    }

    #[test]
    fn test_undo_returns_inverse() {
        let mut history = History::new();
        history.record(rotate("a", 0.0, 90.0));
        assert_eq!(history.undo(), Some(rotate("a", 90.0, 0.0)));
        assert!(!history.can_undo());
        assert_eq!(history.redo(), Some(rotate("a", 0.0, 90.0)));
        assert!(history.can_undo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new();
        history.record(rotate("a", 0.0, 90.0));
        history.undo();
        assert!(history.can_redo());
        history.record(rotate("a", 0.0, 45.0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY + 10) {
            history.record(rotate("a", i as f64, i as f64 + 1.0));
        }
        let mut count = 0;
        while history.undo().is_some() {
            count += 1;
        }
        assert_eq!(count, MAX_HISTORY);
    }

    #[test]
    fn test_empty_edits_ignored() {
        let mut history = History::new();
        history.record(Edit::Patch(Vec::new()));
        let order = vec![ShapeId::new("a")];
        history.record(Edit::Reorder {
            before: order.clone(),
            after: order,
        });
        assert!(!history.can_undo());
    }

    #[test]
    fn test_remap_ids() {
        let mut history = History::new();
        history.record(rotate("tmp_1", 0.0, 90.0));
        history.record(Edit::Reorder {
            before: vec![ShapeId::new("tmp_1"), ShapeId::new("b")],
            after: vec![ShapeId::new("b"), ShapeId::new("tmp_1")],
        });
        let ids = HashMap::from([(ShapeId::new("tmp_1"), ShapeId::new("s9"))]);
        history.remap_ids(&ids);

        assert_eq!(
            history.undo(),
            Some(Edit::Reorder {
                before: vec![ShapeId::new("b"), ShapeId::new("s9")],
                after: vec![ShapeId::new("s9"), ShapeId::new("b")],
            })
        );
        assert_eq!(history.undo(), Some(rotate("s9", 90.0, 0.0)));
    }

    #[test]
    fn test_add_and_delete_are_inverses() {
        let add = Edit::Add(Vec::new());
        assert_eq!(add.inverse(), Edit::Delete(Vec::new()));
        assert_eq!(add.inverse().inverse(), add);
    }
}
