//! Pointer gesture state machine.
//!
//! A gesture starts on pointer-down, mutates the [`ShapeStore`] directly
//! while it runs (so the next frame shows it), and reports what has to leave
//! the client as [`Outcome`]s. Pointer-up always returns to idle.

use crate::geometry::{
    Corner, HandleKind, click_box, handle_at_point, is_click, normalized_box, points_bounds,
    resize_from_handle, rotation_from_pointer, snap_to_grid,
};
use crate::history::PatchChange;
use crate::input::MouseButton;
use crate::shapes::{MIN_SHAPE_SIZE, Shape, ShapeId, ShapeKind, ShapePatch, ShapeStyle};
use crate::store::ShapeStore;
use crate::tools::ToolKind;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// Content given to a text shape drawn with the text tool.
pub const DEFAULT_TEXT: &str = "Text";

/// Transient state of the current gesture.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// A new shape is being dragged out.
    Drawing {
        kind: ShapeKind,
        origin: Point,
        current: Point,
    },
    /// Selected shapes follow the pointer.
    DraggingSelection {
        last: Point,
        /// Pre-drag position of every shape being moved.
        origins: Vec<(ShapeId, Point)>,
    },
    Resizing {
        id: ShapeId,
        corner: Corner,
        start: Point,
        original: Shape,
    },
    Rotating { id: ShapeId, original: Shape },
    /// Freehand points in world space.
    PathDrawing { points: Vec<Point> },
    /// Middle-button pan; `last` is in screen space.
    Panning { last: Point },
}

/// Transient geometry for the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview<'a> {
    /// Unrotated box of a shape being drawn.
    Ghost { kind: ShapeKind, bounds: Rect },
    /// Freehand path captured so far.
    Path(&'a [Point]),
}

/// Work the session must do after a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The store was changed in place; send the patch upstream.
    Live { id: ShapeId, patch: ShapePatch },
    /// A transform gesture ended with these net changes.
    Finished(Vec<PatchChange>),
    /// A new shape to add.
    Create(Shape),
    /// Pan the camera by a screen-space delta.
    Pan(Vec2),
}

/// The interaction state machine plus the active tool and style.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    tool: ToolKind,
    style: ShapeStyle,
    gesture: Gesture,
    grid: Option<f64>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Switch tools. A drawing in progress is dropped.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if matches!(self.gesture, Gesture::Drawing { .. } | Gesture::PathDrawing { .. }) {
            self.gesture = Gesture::Idle;
        }
        self.tool = tool;
    }

    pub fn style(&self) -> ShapeStyle {
        self.style
    }

    pub fn set_style(&mut self, style: ShapeStyle) {
        self.style = style;
    }

    /// Snap committed drawings to a grid of this size, or `None` to disable.
    pub fn set_grid(&mut self, grid: Option<f64>) {
        self.grid = grid.filter(|g| *g > 0.0);
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    pub fn preview(&self) -> Option<Preview<'_>> {
        match &self.gesture {
            Gesture::Drawing { kind, origin, current } => Some(Preview::Ghost {
                kind: *kind,
                bounds: normalized_box(*origin, *current),
            }),
            Gesture::PathDrawing { points } => Some(Preview::Path(points)),
            _ => None,
        }
    }

    /// Start a gesture.
    pub fn pointer_down(
        &mut self,
        world: Point,
        screen: Point,
        button: MouseButton,
        shift: bool,
        store: &mut ShapeStore,
        zoom: f64,
    ) {
        match button {
            MouseButton::Middle => {
                self.gesture = Gesture::Panning { last: screen };
                return;
            }
            MouseButton::Right => return,
            MouseButton::Left => {}
        }

        if let Some(gesture) = Self::handle_gesture(world, store, zoom) {
            self.gesture = gesture;
            return;
        }

        if self.tool.selects() {
            self.begin_selection(world, shift, store);
            return;
        }

        self.gesture = match self.tool {
            ToolKind::Freehand => Gesture::PathDrawing { points: vec![world] },
            tool => match tool.shape_kind() {
                Some(kind) => Gesture::Drawing {
                    kind,
                    origin: world,
                    current: world,
                },
                None => Gesture::Idle,
            },
        };
    }

    /// Resize/rotate gesture if the point is on the sole selection's handles.
    fn handle_gesture(world: Point, store: &ShapeStore, zoom: f64) -> Option<Gesture> {
        let shape = store.sole_selection().filter(|s| !s.locked)?;
        let gesture = match handle_at_point(world, shape, zoom)? {
            HandleKind::Corner(corner) => Gesture::Resizing {
                id: shape.id.clone(),
                corner,
                start: world,
                original: shape.clone(),
            },
            HandleKind::Rotate => Gesture::Rotating {
                id: shape.id.clone(),
                original: shape.clone(),
            },
        };
        Some(gesture)
    }

    fn begin_selection(&mut self, world: Point, shift: bool, store: &mut ShapeStore) {
        let Some(hit) = store.hit_test(world).map(|s| s.id.clone()) else {
            if !shift {
                store.clear_selection();
            }
            return;
        };

        if shift {
            let mut ids = store.selected_ids();
            if let Some(i) = ids.iter().position(|id| id == &hit) {
                ids.remove(i);
            } else {
                ids.push(hit);
            }
            store.set_selection(ids);
        } else if !store.is_selected(&hit) {
            store.set_selection([hit]);
        }

        let origins: Vec<(ShapeId, Point)> = store
            .iter()
            .filter(|s| store.is_selected(&s.id) && !s.locked)
            .map(|s| (s.id.clone(), Point::new(s.x, s.y)))
            .collect();
        if !origins.is_empty() {
            self.gesture = Gesture::DraggingSelection { last: world, origins };
        }
    }

    /// Advance the current gesture.
    pub fn pointer_move(&mut self, world: Point, screen: Point, store: &mut ShapeStore) -> Option<Outcome> {
        match &mut self.gesture {
            Gesture::Idle => None,
            Gesture::Rotating { id, original } => {
                let rotation = rotation_from_pointer(original.center(), world);
                live_patch(store, id, ShapePatch::Rotate { rotation })
            }
            Gesture::Resizing {
                id,
                corner,
                start,
                original,
            } => {
                let r = resize_from_handle(original.bounds(), *corner, world - *start);
                let patch = ShapePatch::Bounds {
                    x: r.x0,
                    y: r.y0,
                    width: r.width(),
                    height: r.height(),
                };
                live_patch(store, id, patch)
            }
            Gesture::DraggingSelection { last, origins } => {
                let delta = world - *last;
                *last = world;
                for (id, _) in origins.iter() {
                    let Some(shape) = store.get(id) else {
                        continue;
                    };
                    let patch = ShapePatch::Move {
                        x: shape.x + delta.x,
                        y: shape.y + delta.y,
                    };
                    if let Err(e) = store.update(id, &patch) {
                        log::debug!("drag skipped {id}: {e}");
                    }
                }
                None
            }
            Gesture::Drawing { current, .. } => {
                *current = world;
                None
            }
            Gesture::PathDrawing { points } => {
                points.push(world);
                None
            }
            Gesture::Panning { last } => {
                let delta = screen - *last;
                *last = screen;
                Some(Outcome::Pan(delta))
            }
        }
    }

    /// Finish the current gesture, wherever the pointer is.
    pub fn pointer_up(&mut self, world: Point, store: &ShapeStore) -> Option<Outcome> {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Panning { .. } => None,
            Gesture::Drawing { kind, origin, .. } => {
                let bounds = if is_click(origin, world) {
                    click_box(world)
                } else {
                    normalized_box(origin, world)
                };
                let bounds = self.finish_box(bounds);
                let mut shape = Shape::new(kind, bounds, self.style);
                if kind == ShapeKind::Text {
                    shape = shape.with_text(DEFAULT_TEXT);
                }
                Some(Outcome::Create(shape))
            }
            Gesture::PathDrawing { points } => {
                if points.len() < 2 {
                    return None;
                }
                let bounds = points_bounds(&points)?;
                let shape = Shape::new(ShapeKind::Freehand, bounds, self.style).with_points(points);
                Some(Outcome::Create(shape))
            }
            Gesture::DraggingSelection { origins, .. } => {
                let changes: Vec<PatchChange> = origins
                    .into_iter()
                    .filter_map(|(id, origin)| {
                        let shape = store.get(&id)?;
                        let now = Point::new(shape.x, shape.y);
                        (now != origin).then(|| PatchChange {
                            id,
                            before: ShapePatch::Move { x: origin.x, y: origin.y },
                            after: ShapePatch::Move { x: now.x, y: now.y },
                        })
                    })
                    .collect();
                (!changes.is_empty()).then_some(Outcome::Finished(changes))
            }
            Gesture::Resizing { id, original, .. } => {
                let shape = store.get(&id)?;
                let after = ShapePatch::Bounds {
                    x: shape.x,
                    y: shape.y,
                    width: shape.width,
                    height: shape.height,
                };
                finished(id, &original, shape, after)
            }
            Gesture::Rotating { id, original } => {
                let shape = store.get(&id)?;
                let after = ShapePatch::Rotate {
                    rotation: shape.rotation,
                };
                finished(id, &original, shape, after)
            }
        }
    }

    /// Abandon the gesture. Drawings are discarded; transforms already shown
    /// are kept and finished like a pointer-up.
    pub fn cancel(&mut self, store: &ShapeStore) -> Option<Outcome> {
        match self.gesture {
            Gesture::Drawing { .. } | Gesture::PathDrawing { .. } | Gesture::Panning { .. } => {
                self.gesture = Gesture::Idle;
                None
            }
            Gesture::Idle => None,
            Gesture::DraggingSelection { last, .. } => self.pointer_up(last, store),
            Gesture::Resizing { start, .. } => self.pointer_up(start, store),
            Gesture::Rotating { ref original, .. } => {
                let center = original.center();
                self.pointer_up(center, store)
            }
        }
    }

    /// Re-key shapes referenced by the running gesture.
    pub fn remap_ids(&mut self, ids: &HashMap<ShapeId, ShapeId>) {
        let remap = |id: &mut ShapeId| {
            if let Some(new) = ids.get(id) {
                *id = new.clone();
            }
        };
        match &mut self.gesture {
            Gesture::DraggingSelection { origins, .. } => {
                origins.iter_mut().for_each(|(id, _)| remap(id));
            }
            Gesture::Resizing { id, original, .. } | Gesture::Rotating { id, original } => {
                remap(id);
                remap(&mut original.id);
            }
            _ => {}
        }
    }

    /// Apply grid snapping and the minimum size to a committed box.
    fn finish_box(&self, bounds: Rect) -> Rect {
        let bounds = match self.grid {
            Some(grid) => Rect::new(
                snap_to_grid(bounds.x0, grid),
                snap_to_grid(bounds.y0, grid),
                snap_to_grid(bounds.x1, grid),
                snap_to_grid(bounds.y1, grid),
            ),
            None => bounds,
        };
        Rect::from_origin_size(
            bounds.origin(),
            (
                bounds.width().max(MIN_SHAPE_SIZE),
                bounds.height().max(MIN_SHAPE_SIZE),
            ),
        )
    }
}

fn live_patch(store: &mut ShapeStore, id: &ShapeId, patch: ShapePatch) -> Option<Outcome> {
    match store.update(id, &patch) {
        Ok(_) => Some(Outcome::Live {
            id: id.clone(),
            patch,
        }),
        Err(e) => {
            log::debug!("gesture update on {id} refused: {e}");
            None
        }
    }
}

fn finished(id: ShapeId, original: &Shape, current: &Shape, after: ShapePatch) -> Option<Outcome> {
    if original == current {
        return None;
    }
    let before = after.inverse_for(original);
    Some(Outcome::Finished(vec![PatchChange { id, before, after }]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZOOM: f64 = 100.0;

    fn down(i: &mut Interaction, store: &mut ShapeStore, p: Point) {
        i.pointer_down(p, p, MouseButton::Left, false, store, ZOOM);
    }

    fn rect_store() -> (ShapeStore, ShapeId) {
        let mut store = ShapeStore::new();
        let mut s = Shape::new(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 100.0, 100.0),
            ShapeStyle::default(),
        );
        s.id = ShapeId::new("r1");
        let id = store.add(s);
        (store, id)
    }

    #[test]
    fn test_click_creates_default_shape() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_tool(ToolKind::Rectangle);
        down(&mut i, &mut store, Point::new(40.0, 40.0));
        let out = i.pointer_up(Point::new(40.0, 40.0), &store);
        let Some(Outcome::Create(shape)) = out else {
            panic!("expected a new shape, got {out:?}");
        };
        assert_eq!(shape.kind, ShapeKind::Rectangle);
        assert_eq!((shape.x, shape.y, shape.width, shape.height), (-10.0, -10.0, 100.0, 100.0));
        assert!(i.is_idle());
    }

    #[test]
    fn test_drag_creates_normalized_box() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_tool(ToolKind::Star);
        down(&mut i, &mut store, Point::new(200.0, 150.0));
        i.pointer_move(Point::new(120.0, 60.0), Point::ZERO, &mut store);
        assert_eq!(
            i.preview(),
            Some(Preview::Ghost {
                kind: ShapeKind::Star,
                bounds: Rect::new(120.0, 60.0, 200.0, 150.0)
            })
        );
        assert!(store.is_empty());
        let Some(Outcome::Create(shape)) = i.pointer_up(Point::new(120.0, 60.0), &store) else {
            panic!("expected a new shape");
        };
        assert_eq!((shape.x, shape.y, shape.width, shape.height), (120.0, 60.0, 80.0, 90.0));
    }

    #[test]
    fn test_thin_drag_respects_minimum() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_tool(ToolKind::Line);
        down(&mut i, &mut store, Point::new(0.0, 0.0));
        let Some(Outcome::Create(shape)) = i.pointer_up(Point::new(80.0, 2.0), &store) else {
            panic!("expected a new shape");
        };
        assert_eq!(shape.width, 80.0);
        assert_eq!(shape.height, MIN_SHAPE_SIZE);
    }

    #[test]
    fn test_grid_snap() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_grid(Some(20.0));
        i.set_tool(ToolKind::Rectangle);
        down(&mut i, &mut store, Point::new(13.0, 27.0));
        let Some(Outcome::Create(shape)) = i.pointer_up(Point::new(95.0, 111.0), &store) else {
            panic!("expected a new shape");
        };
        assert_eq!((shape.x, shape.y, shape.width, shape.height), (20.0, 20.0, 80.0, 100.0));
    }

    #[test]
    fn test_text_tool_seeds_content() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_tool(ToolKind::Text);
        down(&mut i, &mut store, Point::new(0.0, 0.0));
        let Some(Outcome::Create(shape)) = i.pointer_up(Point::new(0.0, 0.0), &store) else {
            panic!("expected a new shape");
        };
        assert_eq!(shape.text.as_deref(), Some(DEFAULT_TEXT));
    }

    #[test]
    fn test_freehand_needs_two_points() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.set_tool(ToolKind::Freehand);
        down(&mut i, &mut store, Point::new(5.0, 5.0));
        assert_eq!(i.pointer_up(Point::new(5.0, 5.0), &store), None);

        down(&mut i, &mut store, Point::new(5.0, 5.0));
        i.pointer_move(Point::new(30.0, -10.0), Point::ZERO, &mut store);
        i.pointer_move(Point::new(12.0, 40.0), Point::ZERO, &mut store);
        let Some(Outcome::Create(shape)) = i.pointer_up(Point::new(12.0, 40.0), &store) else {
            panic!("expected a freehand shape");
        };
        assert_eq!(shape.kind, ShapeKind::Freehand);
        assert_eq!(shape.points.as_ref().map(Vec::len), Some(3));
        assert_eq!((shape.x, shape.y, shape.width, shape.height), (5.0, -10.0, 25.0, 50.0));
    }

    #[test]
    fn test_select_and_drag_applies_incremental_deltas() {
        let (mut store, id) = rect_store();
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(50.0, 50.0));
        assert!(store.is_selected(&id));
        assert!(matches!(i.gesture(), Gesture::DraggingSelection { .. }));

        assert_eq!(i.pointer_move(Point::new(60.0, 55.0), Point::ZERO, &mut store), None);
        i.pointer_move(Point::new(70.0, 70.0), Point::ZERO, &mut store);
        let s = store.get(&id).unwrap();
        assert_eq!((s.x, s.y), (20.0, 20.0));

        let out = i.pointer_up(Point::new(70.0, 70.0), &store);
        assert_eq!(
            out,
            Some(Outcome::Finished(vec![PatchChange {
                id: id.clone(),
                before: ShapePatch::Move { x: 0.0, y: 0.0 },
                after: ShapePatch::Move { x: 20.0, y: 20.0 },
            }]))
        );
        assert!(i.is_idle());
    }

    #[test]
    fn test_click_on_empty_space_clears_selection() {
        let (mut store, id) = rect_store();
        store.set_selection([id]);
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(500.0, 500.0));
        assert_eq!(store.selection_len(), 0);
        assert!(i.is_idle());
    }

    #[test]
    fn test_corner_handle_resizes_from_snapshot() {
        let (mut store, id) = rect_store();
        store.set_selection([id.clone()]);
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(100.0, 100.0));
        assert!(matches!(i.gesture(), Gesture::Resizing { corner: Corner::BottomRight, .. }));

        let out = i.pointer_move(Point::new(150.0, 120.0), Point::ZERO, &mut store);
        assert!(matches!(out, Some(Outcome::Live { .. })));
        // A second move is measured from the gesture start, not the last move.
        i.pointer_move(Point::new(130.0, 90.0), Point::ZERO, &mut store);
        let s = store.get(&id).unwrap();
        assert_eq!((s.width, s.height), (130.0, 90.0));

        // Dragging far past the opposite corner clamps to the minimum.
        i.pointer_move(Point::new(-400.0, -400.0), Point::ZERO, &mut store);
        let s = store.get(&id).unwrap();
        assert_eq!((s.x, s.y, s.width, s.height), (0.0, 0.0, 10.0, 10.0));

        let Some(Outcome::Finished(changes)) = i.pointer_up(Point::new(-400.0, -400.0), &store) else {
            panic!("expected finished resize");
        };
        assert_eq!(
            changes[0].before,
            ShapePatch::Bounds { x: 0.0, y: 0.0, width: 100.0, height: 100.0 }
        );
    }

    #[test]
    fn test_rotate_handle_sets_rotation() {
        let (mut store, id) = rect_store();
        store.set_selection([id.clone()]);
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(50.0, -30.0));
        assert!(matches!(i.gesture(), Gesture::Rotating { .. }));
        i.pointer_move(Point::new(150.0, 50.0), Point::ZERO, &mut store);
        assert!((store.get(&id).unwrap().rotation - 90.0).abs() < 1e-9);
        let out = i.pointer_up(Point::new(150.0, 50.0), &store);
        assert!(matches!(out, Some(Outcome::Finished(_))));
    }

    #[test]
    fn test_locked_shape_has_no_handles_and_does_not_move() {
        let (mut store, id) = rect_store();
        store.update(&id, &ShapePatch::Lock { locked: true }).unwrap();
        store.set_selection([id.clone()]);
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(100.0, 100.0));
        // Falls through to selection; nothing to drag.
        assert!(i.is_idle());
        assert!(store.is_selected(&id));
        i.pointer_move(Point::new(140.0, 140.0), Point::ZERO, &mut store);
        assert_eq!(store.get(&id).unwrap().x, 0.0);
    }

    #[test]
    fn test_middle_button_pans() {
        let mut store = ShapeStore::new();
        let mut i = Interaction::new();
        i.pointer_down(Point::ZERO, Point::new(10.0, 10.0), MouseButton::Middle, false, &mut store, ZOOM);
        let out = i.pointer_move(Point::ZERO, Point::new(25.0, 5.0), &mut store);
        assert_eq!(out, Some(Outcome::Pan(Vec2::new(15.0, -5.0))));
        assert_eq!(i.pointer_up(Point::ZERO, &store), None);
    }

    #[test]
    fn test_shift_click_extends_selection() {
        let (mut store, a) = rect_store();
        let mut other = Shape::new(
            ShapeKind::Circle,
            Rect::new(200.0, 0.0, 300.0, 100.0),
            ShapeStyle::default(),
        );
        other.id = ShapeId::new("c1");
        let b = store.add(other);
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(50.0, 50.0));
        i.pointer_up(Point::new(50.0, 50.0), &store);
        i.pointer_down(Point::new(250.0, 50.0), Point::ZERO, MouseButton::Left, true, &mut store, ZOOM);
        assert_eq!(store.selected_ids(), vec![a, b]);
    }

    #[test]
    fn test_remap_ids_follows_running_gesture() {
        let (mut store, id) = rect_store();
        let mut i = Interaction::new();
        down(&mut i, &mut store, Point::new(50.0, 50.0));
        let mut renamed = store.get(&id).unwrap().clone();
        renamed.id = ShapeId::new("s1");
        store.replace_all(vec![renamed]);
        i.remap_ids(&HashMap::from([(id, ShapeId::new("s1"))]));

        i.pointer_move(Point::new(60.0, 50.0), Point::ZERO, &mut store);
        let out = i.pointer_up(Point::new(60.0, 50.0), &store);
        match out {
            Some(Outcome::Finished(changes)) => assert_eq!(changes[0].id, ShapeId::new("s1")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
