//! Client-local clipboard of full shape snapshots.

use crate::shapes::Shape;
use kurbo::Vec2;

/// Offset applied to pasted and duplicated shapes.
pub const PASTE_OFFSET: Vec2 = Vec2::new(20.0, 20.0);

#[derive(Debug, Default, Clone)]
pub struct Clipboard {
    shapes: Vec<Shape>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&mut self, shapes: Vec<Shape>) {
        if !shapes.is_empty() {
            self.shapes = shapes;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Fresh copies of the clipboard contents, offset and re-identified.
    pub fn paste(&self) -> Vec<Shape> {
        copies_of(&self.shapes)
    }
}

/// Copies of `shapes` under fresh ids, shifted by [`PASTE_OFFSET`].
pub fn copies_of(shapes: &[Shape]) -> Vec<Shape> {
    shapes.iter().map(|s| s.duplicate(PASTE_OFFSET)).collect()
}
