//! Display list built from shape state.
//!
//! [`build_scene`] is a pure function of the [`RenderContext`]: it reads
//! shapes, selection, preview and presence and emits draw commands in
//! paint order. Rasterizing them is a separate step.

use crate::image_cache::ImageCache;
use crate::renderer::RenderContext;
use crate::text::estimate_width;
use kurbo::{Affine, BezPath, Circle, Ellipse, Point, Rect, RoundedRect, Shape as _, Vec2};
use peniko::Color;
use syncspace_core::geometry::star_vertices;
use syncspace_core::interaction::{DEFAULT_TEXT, Preview};
use syncspace_core::presence::Collaborator;
use syncspace_core::shapes::{Shape, ShapeKind, ShapeStyle};

const TOLERANCE: f64 = 0.1;
pub const RECT_CORNER_RADIUS: f64 = 4.0;
/// Shaft shortening and head geometry of arrows.
pub const ARROW_SHAFT_INSET: f64 = 10.0;
pub const ARROW_HEAD_LENGTH: f64 = 15.0;
pub const ARROW_HEAD_HALF_WIDTH: f64 = 8.0;
/// Length of the line from the top edge to the rotate knob.
pub const ROTATE_LINE_LENGTH: f64 = 25.0;
pub const ROTATE_KNOB_RADIUS: f64 = 5.0;
pub const HANDLE_SIZE: f64 = 8.0;
/// Lock glyph anchor, measured in from the top-right corner.
pub const LOCK_INSET: f64 = 12.0;
const LOCK_COLOR: Color = Color::from_rgba8(0x6B, 0x72, 0x80, 255);
const PLACEHOLDER_COLOR: Color = Color::from_rgba8(0xE5, 0xE7, 0xEB, 255);
const WHITE: Color = Color::from_rgba8(255, 255, 255, 255);
pub const NAME_TAG_FONT_SIZE: f64 = 11.0;
pub const NAME_TAG_HEIGHT: f64 = 16.0;

/// Where a text origin sits relative to the glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    /// Origin is the top of the em box.
    Top,
    /// Origin is on the baseline.
    Alphabetic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill {
        path: BezPath,
        transform: Affine,
        color: Color,
    },
    Stroke {
        path: BezPath,
        transform: Affine,
        color: Color,
        width: f64,
    },
    Text {
        text: String,
        origin: Point,
        size: f64,
        baseline: TextBaseline,
        transform: Affine,
        color: Color,
    },
    /// A decoded image stretched over `rect`.
    Image {
        url: String,
        rect: Rect,
        transform: Affine,
    },
}

/// One frame's draw commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Frame size in physical pixels.
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub commands: Vec<DrawCommand>,
    /// Image URLs that were skipped because they are not decoded yet.
    pub pending_images: Vec<String>,
}

/// Transform from a shape's local box (origin top-left, unrotated) into
/// world space.
pub fn shape_transform(shape: &Shape) -> Affine {
    Affine::translate(shape.center().to_vec2())
        * Affine::rotate(shape.rotation.to_radians())
        * Affine::translate((-shape.width / 2.0, -shape.height / 2.0))
}

pub fn build_scene(ctx: &RenderContext, images: &ImageCache) -> Scene {
    let (width, height) = ctx.pixel_size();
    let mut builder = SceneBuilder {
        commands: Vec::new(),
        pending_images: Vec::new(),
        images,
    };
    let view = Affine::scale(ctx.scale_factor) * ctx.camera.transform();
    let sole = ctx.selection.len() == 1;

    for shape in ctx.shapes.iter().filter(|s| s.visible) {
        builder.shape(shape, view * shape_transform(shape));
        if ctx.is_selected(&shape.id) {
            builder.selection(shape, view, ctx.selection_color, sole && !shape.locked);
        }
        if shape.locked {
            builder.lock_glyph(shape, view);
        }
    }

    match &ctx.preview {
        Some(Preview::Ghost { kind, bounds }) => {
            let mut ghost = Shape::new(*kind, *bounds, ctx.preview_style);
            if *kind == ShapeKind::Text {
                ghost = ghost.with_text(DEFAULT_TEXT);
            }
            builder.shape(&ghost, view * Affine::translate(bounds.origin().to_vec2()));
        }
        Some(Preview::Path(points)) => builder.path_preview(points, &ctx.preview_style, view),
        None => {}
    }

    for collaborator in ctx.collaborators {
        builder.cursor(collaborator, view);
    }

    Scene {
        width,
        height,
        background: ctx.background_color,
        commands: builder.commands,
        pending_images: builder.pending_images,
    }
}

struct SceneBuilder<'a> {
    commands: Vec<DrawCommand>,
    pending_images: Vec<String>,
    images: &'a ImageCache,
}

impl SceneBuilder<'_> {
    fn fill(&mut self, path: BezPath, transform: Affine, color: Color) {
        if color.components[3] <= 0.0 {
            return;
        }
        self.commands.push(DrawCommand::Fill {
            path,
            transform,
            color,
        });
    }

    fn stroke(&mut self, path: BezPath, transform: Affine, color: Color, width: f64) {
        if width <= 0.0 || color.components[3] <= 0.0 {
            return;
        }
        self.commands.push(DrawCommand::Stroke {
            path,
            transform,
            color,
            width,
        });
    }

    fn fill_and_stroke(&mut self, path: BezPath, shape: &Shape, transform: Affine) {
        self.fill(path.clone(), transform, shape.fill_color());
        self.stroke(path, transform, shape.stroke_color(), shape.stroke_width);
    }

    /// Paint a shape in its local box.
    fn shape(&mut self, shape: &Shape, transform: Affine) {
        let (w, h) = (shape.width, shape.height);
        match shape.kind {
            ShapeKind::Rectangle => {
                let path = RoundedRect::new(0.0, 0.0, w, h, RECT_CORNER_RADIUS).to_path(TOLERANCE);
                self.fill_and_stroke(path, shape, transform);
            }
            ShapeKind::Circle => {
                let path = Ellipse::from_rect(Rect::new(0.0, 0.0, w, h)).to_path(TOLERANCE);
                self.fill_and_stroke(path, shape, transform);
            }
            ShapeKind::Triangle => {
                let path = polygon(&[Point::new(w / 2.0, 0.0), Point::new(w, h), Point::new(0.0, h)]);
                self.fill_and_stroke(path, shape, transform);
            }
            ShapeKind::Star => {
                let path = polygon(&star_vertices(w, h));
                self.fill_and_stroke(path, shape, transform);
            }
            ShapeKind::Line => {
                let path = polyline(&[Point::new(0.0, h / 2.0), Point::new(w, h / 2.0)]);
                self.stroke(path, transform, shape.stroke_color(), shape.stroke_width);
            }
            ShapeKind::Arrow => {
                let mid = h / 2.0;
                let shaft = polyline(&[Point::new(0.0, mid), Point::new(w - ARROW_SHAFT_INSET, mid)]);
                self.stroke(shaft, transform, shape.stroke_color(), shape.stroke_width);
                let head = polygon(&[
                    Point::new(w, mid),
                    Point::new(w - ARROW_HEAD_LENGTH, mid - ARROW_HEAD_HALF_WIDTH),
                    Point::new(w - ARROW_HEAD_LENGTH, mid + ARROW_HEAD_HALF_WIDTH),
                ]);
                self.fill(head, transform, shape.fill_color());
            }
            ShapeKind::Freehand => {
                let Some(points) = shape.points.as_deref() else {
                    return;
                };
                let offset = Vec2::new(-shape.x, -shape.y);
                let local: Vec<Point> = points.iter().map(|p| *p + offset).collect();
                self.stroke(polyline(&local), transform, shape.stroke_color(), shape.stroke_width);
            }
            ShapeKind::Text => {
                let text = shape.text.as_deref().filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TEXT);
                self.commands.push(DrawCommand::Text {
                    text: text.to_string(),
                    origin: Point::ZERO,
                    size: h,
                    baseline: TextBaseline::Top,
                    transform,
                    color: shape.stroke_color(),
                });
            }
            ShapeKind::Image => self.image(shape, transform),
        }
    }

    fn image(&mut self, shape: &Shape, transform: Affine) {
        let Some(url) = shape.image_url.as_deref() else {
            return;
        };
        let rect = Rect::new(0.0, 0.0, shape.width, shape.height);
        if self.images.get(url).is_some() {
            self.commands.push(DrawCommand::Image {
                url: url.to_string(),
                rect,
                transform,
            });
        } else if self.images.has_failed(url) {
            self.fill(rect.to_path(TOLERANCE), transform, PLACEHOLDER_COLOR);
        } else if !self.pending_images.iter().any(|u| u == url) {
            self.pending_images.push(url.to_string());
        }
    }

    /// Axis-aligned outline at the stored box, plus handles when editable.
    fn selection(&mut self, shape: &Shape, view: Affine, color: Color, handles: bool) {
        let bounds = shape.bounds();
        self.stroke(bounds.to_path(TOLERANCE), view, color, 1.0);
        if !handles {
            return;
        }

        let top = Point::new(bounds.center().x, bounds.y0);
        let knob = Point::new(top.x, top.y - ROTATE_LINE_LENGTH);
        self.stroke(polyline(&[top, knob]), view, color, 1.0);
        let knob_path = Circle::new(knob, ROTATE_KNOB_RADIUS).to_path(TOLERANCE);
        self.fill(knob_path.clone(), view, WHITE);
        self.stroke(knob_path, view, color, 1.0);

        let half = HANDLE_SIZE / 2.0;
        for corner in [
            Point::new(bounds.x0, bounds.y0),
            Point::new(bounds.x1, bounds.y0),
            Point::new(bounds.x0, bounds.y1),
            Point::new(bounds.x1, bounds.y1),
        ] {
            let square = Rect::new(corner.x - half, corner.y - half, corner.x + half, corner.y + half)
                .to_path(TOLERANCE);
            self.fill(square.clone(), view, WHITE);
            self.stroke(square, view, color, 1.0);
        }
    }

    /// Small padlock whose bottom-left sits 12 units in from the top-right.
    fn lock_glyph(&mut self, shape: &Shape, view: Affine) {
        let anchor = Point::new(shape.x + shape.width - LOCK_INSET, shape.y + LOCK_INSET);
        let body = RoundedRect::new(anchor.x, anchor.y - 6.0, anchor.x + 9.0, anchor.y, 1.0);
        self.fill(body.to_path(TOLERANCE), view, LOCK_COLOR);
        let shackle = polyline(&[
            Point::new(anchor.x + 2.0, anchor.y - 6.0),
            Point::new(anchor.x + 2.0, anchor.y - 9.5),
            Point::new(anchor.x + 7.0, anchor.y - 9.5),
            Point::new(anchor.x + 7.0, anchor.y - 6.0),
        ]);
        self.stroke(shackle, view, LOCK_COLOR, 1.5);
    }

    fn path_preview(&mut self, points: &[Point], style: &ShapeStyle, view: Affine) {
        if points.len() < 2 {
            return;
        }
        self.stroke(polyline(points), view, style.color.into(), style.stroke_width);
    }

    /// Pointer triangle and name tag in the collaborator's color.
    fn cursor(&mut self, collaborator: &Collaborator, view: Affine) {
        let color: Color = collaborator.color.into();
        let at = view * Affine::translate(collaborator.cursor.to_vec2());
        let pointer = polygon(&[Point::new(0.0, 0.0), Point::new(0.0, 18.0), Point::new(12.0, 12.0)]);
        self.fill(pointer, at, color);

        let tag_width = estimate_width(&collaborator.name, NAME_TAG_FONT_SIZE) + 8.0;
        let tag = Rect::new(10.0, 16.0, 10.0 + tag_width, 16.0 + NAME_TAG_HEIGHT);
        self.fill(tag.to_path(TOLERANCE), at, color);
        self.commands.push(DrawCommand::Text {
            text: collaborator.name.clone(),
            origin: Point::new(14.0, 28.0),
            size: NAME_TAG_FONT_SIZE,
            baseline: TextBaseline::Alphabetic,
            transform: at,
            color: WHITE,
        });
    }
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
    }
    path
}

fn polygon(points: &[Point]) -> BezPath {
    let mut path = polyline(points);
    path.close_path();
    path
}
