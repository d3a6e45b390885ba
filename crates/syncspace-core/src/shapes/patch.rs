//! Typed partial updates to a shape.
//!
//! Every edit that leaves the client is one of these variants, validated
//! before it touches a store. The durable store receives the same value.

use super::{MIN_SHAPE_SIZE, SerializableColor, Shape, ShapeKind};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a patch is refused.
#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("stroke width {0} is negative")]
    NegativeStrokeWidth(f64),
    #[error("fill opacity {0} is outside 0..=1")]
    FillOpacityOutOfRange(f64),
    #[error("size {width}x{height} is below the minimum of 10 units")]
    BelowMinimumSize { width: f64, height: f64 },
    #[error("a freehand path needs at least two points")]
    TooFewPoints,
    #[error("style patch changes nothing")]
    EmptyStyle,
    #[error("shape is locked")]
    Locked,
}

/// Optional style fields; `None` leaves the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<SerializableColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

/// A permitted partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapePatch {
    Move { x: f64, y: f64 },
    Bounds { x: f64, y: f64, width: f64, height: f64 },
    Rotate { rotation: f64 },
    Style(StylePatch),
    Lock { locked: bool },
    Visibility { visible: bool },
    Text { text: String },
    /// Replace a freehand path together with its bounding box.
    Points {
        points: Vec<Point>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

fn finite(value: f64, field: &'static str) -> Result<(), PatchError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PatchError::NonFinite(field))
    }
}

/// Map a rotation in degrees into `[0, 360)`.
pub(crate) fn normalize_rotation(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if r >= 360.0 { 0.0 } else { r }
}

impl ShapePatch {
    /// Patches that change position, size or orientation.
    pub fn is_geometric(&self) -> bool {
        matches!(
            self,
            ShapePatch::Move { .. }
                | ShapePatch::Bounds { .. }
                | ShapePatch::Rotate { .. }
                | ShapePatch::Points { .. }
        )
    }

    /// Check the values without applying them.
    pub fn validate(&self) -> Result<(), PatchError> {
        match self {
            ShapePatch::Move { x, y } => {
                finite(*x, "x")?;
                finite(*y, "y")
            }
            ShapePatch::Bounds { x, y, width, height } => {
                finite(*x, "x")?;
                finite(*y, "y")?;
                finite(*width, "width")?;
                finite(*height, "height")?;
                if *width < MIN_SHAPE_SIZE || *height < MIN_SHAPE_SIZE {
                    return Err(PatchError::BelowMinimumSize {
                        width: *width,
                        height: *height,
                    });
                }
                Ok(())
            }
            ShapePatch::Rotate { rotation } => finite(*rotation, "rotation"),
            ShapePatch::Style(style) => {
                if style.color.is_none() && style.stroke_width.is_none() && style.fill_opacity.is_none() {
                    return Err(PatchError::EmptyStyle);
                }
                if let Some(w) = style.stroke_width {
                    finite(w, "strokeWidth")?;
                    if w < 0.0 {
                        return Err(PatchError::NegativeStrokeWidth(w));
                    }
                }
                match style.fill_opacity {
                    Some(o) if !(0.0..=1.0).contains(&o) => Err(PatchError::FillOpacityOutOfRange(o)),
                    _ => Ok(()),
                }
            }
            ShapePatch::Lock { .. } | ShapePatch::Visibility { .. } | ShapePatch::Text { .. } => Ok(()),
            ShapePatch::Points { points, x, y, width, height } => {
                if points.len() < 2 {
                    return Err(PatchError::TooFewPoints);
                }
                for (value, field) in [(*x, "x"), (*y, "y"), (*width, "width"), (*height, "height")] {
                    finite(value, field)?;
                }
                if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                    return Err(PatchError::NonFinite("points"));
                }
                Ok(())
            }
        }
    }

    /// Validate, then write the fields into `shape`.
    pub fn apply(&self, shape: &mut Shape) -> Result<(), PatchError> {
        self.validate()?;
        match self {
            ShapePatch::Move { x, y } => {
                shape.translate(Vec2::new(x - shape.x, y - shape.y));
            }
            ShapePatch::Bounds { x, y, width, height } => {
                if shape.kind == ShapeKind::Freehand {
                    remap_points(shape, *x, *y, *width, *height);
                }
                shape.x = *x;
                shape.y = *y;
                shape.width = *width;
                shape.height = *height;
            }
            ShapePatch::Rotate { rotation } => shape.rotation = normalize_rotation(*rotation),
            ShapePatch::Style(style) => {
                if let Some(color) = style.color {
                    shape.color = color;
                }
                if let Some(w) = style.stroke_width {
                    shape.stroke_width = w;
                }
                if let Some(o) = style.fill_opacity {
                    shape.fill_opacity = o;
                }
            }
            ShapePatch::Lock { locked } => shape.locked = *locked,
            ShapePatch::Visibility { visible } => shape.visible = *visible,
            ShapePatch::Text { text } => shape.text = Some(text.clone()),
            ShapePatch::Points { points, x, y, width, height } => {
                shape.points = Some(points.clone());
                shape.x = *x;
                shape.y = *y;
                shape.width = *width;
                shape.height = *height;
            }
        }
        Ok(())
    }

    /// The patch that would restore the fields this patch touches to their
    /// current values in `shape`.
    ///
    /// A box smaller than the minimum size is restored at the minimum, so
    /// the inverse always passes [`validate`](Self::validate).
    pub fn inverse_for(&self, shape: &Shape) -> ShapePatch {
        match self {
            ShapePatch::Move { .. } => ShapePatch::Move { x: shape.x, y: shape.y },
            ShapePatch::Bounds { .. } | ShapePatch::Points { .. } => match &shape.points {
                Some(points) if shape.kind == ShapeKind::Freehand => ShapePatch::Points {
                    points: points.clone(),
                    x: shape.x,
                    y: shape.y,
                    width: shape.width,
                    height: shape.height,
                },
                _ => ShapePatch::Bounds {
                    x: shape.x,
                    y: shape.y,
                    width: shape.width.max(MIN_SHAPE_SIZE),
                    height: shape.height.max(MIN_SHAPE_SIZE),
                },
            },
            ShapePatch::Rotate { .. } => ShapePatch::Rotate { rotation: shape.rotation },
            ShapePatch::Style(style) => ShapePatch::Style(StylePatch {
                color: style.color.map(|_| shape.color),
                stroke_width: style.stroke_width.map(|_| shape.stroke_width),
                fill_opacity: style.fill_opacity.map(|_| shape.fill_opacity),
            }),
            ShapePatch::Lock { .. } => ShapePatch::Lock { locked: shape.locked },
            ShapePatch::Visibility { .. } => ShapePatch::Visibility { visible: shape.visible },
            ShapePatch::Text { .. } => ShapePatch::Text {
                text: shape.text.clone().unwrap_or_default(),
            },
        }
    }
}

/// Scale freehand points from the current box into a new one.
fn remap_points(shape: &mut Shape, x: f64, y: f64, width: f64, height: f64) {
    let (ox, oy, ow, oh) = (shape.x, shape.y, shape.width, shape.height);
    let Some(points) = shape.points.as_mut() else {
        return;
    };
    let sx = if ow > 0.0 { width / ow } else { 1.0 };
    let sy = if oh > 0.0 { height / oh } else { 1.0 };
    for p in points.iter_mut() {
        *p = Point::new(x + (p.x - ox) * sx, y + (p.y - oy) * sy);
    }
}
