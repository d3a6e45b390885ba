//! Hit-testing, rotation and resize math.
//!
//! Everything here is a pure function of its arguments. Angles are in degrees,
//! clockwise on screen (y grows downward).

use crate::shapes::{MIN_SHAPE_SIZE, Shape, ShapeKind};
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Handle hit padding in screen pixels at 100% zoom.
pub const HANDLE_HIT_PADDING: f64 = 10.0;
/// Distance of the rotate knob above the top edge, in world units.
pub const ROTATE_HANDLE_OFFSET: f64 = 30.0;
/// Drags shorter than this on both axes count as a click.
pub const CLICK_THRESHOLD: f64 = 5.0;
/// Side of the shape created by a click with a drawing tool.
pub const CLICK_SHAPE_SIZE: f64 = 100.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Fixed order in which corners are hit-tested.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    fn is_left(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }

    fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }

    /// Position of this corner on an unrotated box.
    pub fn position(self, bounds: Rect) -> Point {
        let x = if self.is_left() { bounds.x0 } else { bounds.x1 };
        let y = if self.is_top() { bounds.y0 } else { bounds.y1 };
        Point::new(x, y)
    }
}

/// Interactive hotspot on a selected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// Corner resize handle.
    Corner(Corner),
    /// Rotation knob above the top-center.
    Rotate,
}

/// Position of the rotate knob on an unrotated box.
pub fn rotate_handle_position(bounds: Rect) -> Point {
    Point::new(bounds.center().x, bounds.y0 - ROTATE_HANDLE_OFFSET)
}

/// Whether `point` lies inside `shape`.
///
/// Circles use the ellipse equation. Everything else uses the axis-aligned
/// box and ignores rotation.
pub fn point_in_shape(point: Point, shape: &Shape) -> bool {
    let bounds = shape.bounds();
    if shape.kind == ShapeKind::Circle {
        let rx = shape.width / 2.0;
        let ry = shape.height / 2.0;
        if rx <= 0.0 || ry <= 0.0 {
            return false;
        }
        let c = bounds.center();
        let nx = (point.x - c.x) / rx;
        let ny = (point.y - c.y) / ry;
        return nx * nx + ny * ny <= 1.0;
    }
    point.x >= bounds.x0 && point.x <= bounds.x1 && point.y >= bounds.y0 && point.y <= bounds.y1
}

/// Rotate `point` about `center` by `degrees`.
pub fn rotate_point(center: Point, point: Point, degrees: f64) -> Point {
    Affine::rotate_about(degrees.to_radians(), center) * point
}

/// Find the handle of `shape` under `point`.
///
/// The point is first brought into the shape's unrotated frame. The hit
/// padding shrinks as zoom grows so targets keep a constant screen size.
pub fn handle_at_point(point: Point, shape: &Shape, zoom_percent: f64) -> Option<HandleKind> {
    let bounds = shape.bounds();
    let local = rotate_point(bounds.center(), point, -shape.rotation);
    let padding = HANDLE_HIT_PADDING / (zoom_percent / 100.0);
    let near = |target: Point| (local.x - target.x).abs() < padding && (local.y - target.y).abs() < padding;

    Corner::ALL
        .into_iter()
        .find(|corner| near(corner.position(bounds)))
        .map(HandleKind::Corner)
        .or_else(|| near(rotate_handle_position(bounds)).then_some(HandleKind::Rotate))
}

/// Resize the pre-gesture box `original` by the total pointer displacement.
///
/// Only the edges adjacent to `corner` move. Each dimension is clamped to the
/// minimum size with the opposite edge held in place.
pub fn resize_from_handle(original: Rect, corner: Corner, displacement: Vec2) -> Rect {
    let (mut x0, mut x1) = (original.x0, original.x1);
    let (mut y0, mut y1) = (original.y0, original.y1);

    if corner.is_left() {
        x0 = (original.x0 + displacement.x).min(x1 - MIN_SHAPE_SIZE);
    } else {
        x1 = (original.x1 + displacement.x).max(x0 + MIN_SHAPE_SIZE);
    }
    if corner.is_top() {
        y0 = (original.y0 + displacement.y).min(y1 - MIN_SHAPE_SIZE);
    } else {
        y1 = (original.y1 + displacement.y).max(y0 + MIN_SHAPE_SIZE);
    }
    Rect::new(x0, y0, x1, y1)
}

/// Rotation (degrees, 0 = up) that points from `center` toward `pointer`.
pub fn rotation_from_pointer(center: Point, pointer: Point) -> f64 {
    let d = pointer - center;
    let degrees = d.y.atan2(d.x) * 180.0 / PI + 90.0;
    degrees.rem_euclid(360.0)
}

/// Box spanned by two drag corners with non-negative width and height.
pub fn normalized_box(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b)
}

/// Whether a drag from `origin` to `end` is short enough to be a click.
pub fn is_click(origin: Point, end: Point) -> bool {
    (end.x - origin.x).abs() < CLICK_THRESHOLD && (end.y - origin.y).abs() < CLICK_THRESHOLD
}

/// Default-sized box centered on a click.
pub fn click_box(center: Point) -> Rect {
    Rect::from_center_size(center, (CLICK_SHAPE_SIZE, CLICK_SHAPE_SIZE))
}

/// Min/max extent of a point set, or `None` when empty.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(rest.iter().fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)))
}

/// Snap a value to the nearest multiple of `grid`.
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

/// The ten vertices of a five-point star in box-local coordinates.
///
/// Outer radius is half the smaller side, inner radius half of that, and the
/// first vertex sits straight above the center.
pub fn star_vertices(width: f64, height: f64) -> [Point; 10] {
    let center = Point::new(width / 2.0, height / 2.0);
    let outer = width.min(height) / 2.0;
    let inner = outer / 2.0;
    let step = PI / 5.0;
    std::array::from_fn(|i| {
        let radius = if i % 2 == 0 { outer } else { inner };
        let angle = i as f64 * step - PI / 2.0;
        center + Vec2::from_angle(angle) * radius
    })
}
