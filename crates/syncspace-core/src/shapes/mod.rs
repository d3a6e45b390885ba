//! Shape records for the whiteboard.
//!
//! A [`Shape`] is a flat record mirroring what the durable store keeps: a
//! bounding box in world coordinates, a rotation about the box center, style
//! fields and a few kind-specific payloads (freehand points, text, image URL).

mod color;
mod patch;

pub use color::{ColorParseError, SerializableColor};
pub use patch::{PatchError, ShapePatch, StylePatch};

use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Smallest width/height a committed shape may have.
pub const MIN_SHAPE_SIZE: f64 = 10.0;

/// Prefix used for ids generated on the client before the store assigns one.
const TEMPORARY_PREFIX: &str = "tmp_";

/// Identifier of a project (the scope of a shape list and a presence room).
pub type ProjectId = String;

/// Unique identifier for a shape.
///
/// Ids come in two regimes: temporary ids minted locally for immediate
/// interactivity, and permanent ids assigned by the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh client-side id.
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Whether this id was minted locally and not yet replaced by the store.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The closed set of drawable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    Star,
    Line,
    Arrow,
    /// Freehand path through world-space points.
    #[serde(rename = "pencil", alias = "freehand")]
    Freehand,
    Text,
    Image,
}

impl ShapeKind {
    /// Kinds painted with both a fill and a stroke.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            ShapeKind::Rectangle | ShapeKind::Circle | ShapeKind::Triangle | ShapeKind::Star
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Star => "star",
            ShapeKind::Line => "line",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Freehand => "pencil",
            ShapeKind::Text => "text",
            ShapeKind::Image => "image",
        }
    }
}

/// Stroke/fill settings shared by new shapes and the properties bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeStyle {
    pub color: SerializableColor,
    pub stroke_width: f64,
    pub fill_opacity: f64,
}

impl ShapeStyle {
    pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
    pub const DEFAULT_FILL_OPACITY: f64 = 0.3;
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::new(0x3B, 0x82, 0xF6, 255),
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            fill_opacity: Self::DEFAULT_FILL_OPACITY,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A drawable entity on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    #[serde(default)]
    pub project_id: ProjectId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// Left edge of the bounding box.
    pub x: f64,
    /// Top edge of the bounding box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees clockwise about the box center, in `[0, 360)`.
    #[serde(default)]
    pub rotation: f64,
    pub color: SerializableColor,
    pub stroke_width: f64,
    pub fill_opacity: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Shape {
    /// Create a shape of `kind` filling `bounds`, with a fresh temporary id.
    pub fn new(kind: ShapeKind, bounds: Rect, style: ShapeStyle) -> Self {
        Self {
            id: ShapeId::temporary(),
            project_id: ProjectId::new(),
            kind,
            x: bounds.x0,
            y: bounds.y0,
            width: bounds.width(),
            height: bounds.height(),
            rotation: 0.0,
            color: style.color,
            stroke_width: style.stroke_width,
            fill_opacity: style.fill_opacity,
            visible: true,
            locked: false,
            points: None,
            text: None,
            image_url: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = Some(points);
        self
    }

    /// Axis-aligned box at the stored position, ignoring rotation.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn style(&self) -> ShapeStyle {
        ShapeStyle {
            color: self.color,
            stroke_width: self.stroke_width,
            fill_opacity: self.fill_opacity,
        }
    }

    pub fn stroke_color(&self) -> Color {
        self.color.into()
    }

    /// Base color with the fill opacity applied as alpha.
    pub fn fill_color(&self) -> Color {
        let alpha = (self.fill_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.color.with_alpha(alpha).into()
    }

    /// Shift the box and any freehand points.
    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        if let Some(points) = self.points.as_mut() {
            for p in points.iter_mut() {
                *p += delta;
            }
        }
    }

    /// Copy of this shape under a fresh temporary id, shifted by `offset`.
    pub fn duplicate(&self, offset: Vec2) -> Self {
        let mut copy = self.clone();
        copy.id = ShapeId::temporary();
        copy.translate(offset);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Shape {
        Shape::new(
            ShapeKind::Rectangle,
            Rect::new(10.0, 20.0, 110.0, 70.0),
            ShapeStyle::default(),
        )
    }

    #[test]
    fn test_temporary_ids_are_unique_and_marked() {
        let a = ShapeId::temporary();
        let b = ShapeId::temporary();
        assert_ne!(a, b);
        assert!(a.is_temporary());
        assert!(!ShapeId::new("k57abc").is_temporary());
    }

    #[test]
    fn test_bounds_and_center() {
        let s = sample();
        assert_eq!(s.bounds(), Rect::new(10.0, 20.0, 110.0, 70.0));
        assert_eq!(s.center(), Point::new(60.0, 45.0));
    }

    #[test]
    fn test_fill_color_uses_opacity() {
        let mut s = sample();
        s.fill_opacity = 0.5;
        let rgba = s.fill_color().to_rgba8();
        assert_eq!((rgba.r, rgba.g, rgba.b, rgba.a), (0x3B, 0x82, 0xF6, 128));
    }

    #[test]
    fn test_translate_moves_points() {
        let mut s = Shape::new(
            ShapeKind::Freehand,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            ShapeStyle::default(),
        )
        .with_points(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        s.translate(Vec2::new(5.0, -5.0));
        assert_eq!((s.x, s.y), (5.0, -5.0));
        assert_eq!(s.points.unwrap()[1], Point::new(15.0, 5.0));
    }

    #[test]
    fn test_duplicate_gets_fresh_id() {
        let s = sample();
        let copy = s.duplicate(Vec2::new(20.0, 20.0));
        assert_ne!(copy.id, s.id);
        assert_eq!((copy.x, copy.y), (30.0, 40.0));
    }

    #[test]
    fn test_wire_format() {
        let mut s = sample();
        s.id = ShapeId::new("abc");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["strokeWidth"], 2.0);
        assert_eq!(json["color"], "#3B82F6");
        assert!(json.get("points").is_none());

        let freehand: Shape = serde_json::from_str(
            r##"{"id":"p1","type":"pencil","x":0,"y":0,"width":10,"height":10,
                "color":"#000000","strokeWidth":1,"fillOpacity":0,
                "points":[{"x":0,"y":0},{"x":10,"y":10}]}"##,
        )
        .unwrap();
        assert_eq!(freehand.kind, ShapeKind::Freehand);
        assert!(freehand.visible);
        assert!(!freehand.locked);
        assert_eq!(freehand.points.as_ref().map(Vec::len), Some(2));
    }
}
