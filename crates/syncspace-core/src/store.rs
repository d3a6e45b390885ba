//! Ordered shape collection with a selection set.
//!
//! The sequence order is the paint order, back to front. There is no
//! z-index field: reordering permutes the sequence.

use crate::geometry::point_in_shape;
use crate::shapes::{PatchError, Shape, ShapeId, ShapePatch};
use kurbo::Point;
use std::collections::HashSet;
use thiserror::Error;

/// Why a local edit was refused.
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("no shape with id {0}")]
    NotFound(ShapeId),
    #[error("shape {0} is locked")]
    Locked(ShapeId),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Target end of a reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    Front,
    Back,
}

/// A shape taken out of the store together with where it sat.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub index: usize,
    pub shape: Shape,
}

#[derive(Debug, Clone, Default)]
pub struct ShapeStore {
    shapes: Vec<Shape>,
    selection: HashSet<ShapeId>,
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes back to front.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Shape> {
        self.shapes.iter()
    }

    pub fn index_of(&self, id: &ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| &s.id == id)
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.get(id).is_some()
    }

    /// Append a shape on top. A shape with the same id is replaced in place.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id.clone();
        match self.index_of(&id) {
            Some(i) => self.shapes[i] = shape,
            None => self.shapes.push(shape),
        }
        id
    }

    /// Put a shape back at a given paint position.
    pub fn insert_at(&mut self, index: usize, shape: Shape) {
        if let Some(i) = self.index_of(&shape.id) {
            self.shapes.remove(i);
        }
        let index = index.min(self.shapes.len());
        self.shapes.insert(index, shape);
    }

    /// Apply a patch and return the shape as it was before.
    pub fn update(&mut self, id: &ShapeId, patch: &ShapePatch) -> Result<Shape, EditError> {
        let shape = self
            .shapes
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| EditError::NotFound(id.clone()))?;
        if shape.locked && patch.is_geometric() {
            return Err(EditError::Locked(id.clone()));
        }
        let before = shape.clone();
        patch.apply(shape)?;
        Ok(before)
    }

    /// Remove shapes and drop them from the selection in the same step.
    ///
    /// Returns what was removed, ordered by original index. Unknown ids are
    /// ignored.
    pub fn delete(&mut self, ids: &[ShapeId]) -> Vec<Removed> {
        let doomed: HashSet<&ShapeId> = ids.iter().collect();
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.shapes.len());
        for (index, shape) in std::mem::take(&mut self.shapes).into_iter().enumerate() {
            if doomed.contains(&shape.id) {
                removed.push(Removed { index, shape });
            } else {
                kept.push(shape);
            }
        }
        self.shapes = kept;
        self.selection.retain(|id| !doomed.contains(id));
        removed
    }

    /// Move `ids` to the front or back, keeping their relative order.
    ///
    /// Returns the previous order of all ids so the move can be undone.
    pub fn reorder(&mut self, ids: &[ShapeId], to: ZOrder) -> Vec<ShapeId> {
        let previous = self.order();
        let moving: HashSet<&ShapeId> = ids.iter().collect();
        let (picked, rest): (Vec<Shape>, Vec<Shape>) = std::mem::take(&mut self.shapes)
            .into_iter()
            .partition(|s| moving.contains(&s.id));
        self.shapes = match to {
            ZOrder::Front => rest.into_iter().chain(picked).collect(),
            ZOrder::Back => picked.into_iter().chain(rest).collect(),
        };
        previous
    }

    /// Current paint order as ids.
    pub fn order(&self) -> Vec<ShapeId> {
        self.shapes.iter().map(|s| s.id.clone()).collect()
    }

    /// Permute shapes to follow `order`. Shapes not named keep their relative
    /// order and go on top.
    pub fn restore_order(&mut self, order: &[ShapeId]) {
        let mut pool = std::mem::take(&mut self.shapes);
        let mut ordered = Vec::with_capacity(pool.len());
        for id in order {
            if let Some(i) = pool.iter().position(|s| &s.id == id) {
                ordered.push(pool.remove(i));
            }
        }
        ordered.extend(pool);
        self.shapes = ordered;
    }

    /// Replace the selection. Ids not in the store are dropped.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        let selection = ids.into_iter().filter(|id| self.contains(id)).collect();
        self.selection = selection;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, id: &ShapeId) -> bool {
        self.selection.contains(id)
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Selected ids in paint order.
    pub fn selected_ids(&self) -> Vec<ShapeId> {
        self.shapes
            .iter()
            .filter(|s| self.selection.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    /// The selected shape when exactly one is selected.
    pub fn sole_selection(&self) -> Option<&Shape> {
        if self.selection.len() != 1 {
            return None;
        }
        self.shapes.iter().find(|s| self.selection.contains(&s.id))
    }

    /// Topmost visible shape containing `point`.
    pub fn hit_test(&self, point: Point) -> Option<&Shape> {
        self.shapes
            .iter()
            .rev()
            .find(|s| s.visible && point_in_shape(point, s))
    }

    /// Overwrite the whole collection with an authoritative snapshot.
    pub fn replace_all(&mut self, snapshot: Vec<Shape>) {
        self.shapes = snapshot;
        let present: HashSet<&ShapeId> = self.shapes.iter().map(|s| &s.id).collect();
        self.selection.retain(|id| present.contains(id));
    }
}
