//! CPU rasterizer backed by tiny-skia.

use crate::image_cache::{DecodedImage, ImageCache};
use crate::renderer::{Frame, RenderResult, Renderer, RendererError};
use crate::scene::{DrawCommand, Scene, TextBaseline};
use crate::text::{FALLBACK_ASCENT, FontData, fallback_outline};
use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use peniko::Color;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};

/// Software renderer. Optionally draws text with a loaded font.
#[derive(Default)]
pub struct SoftwareRenderer {
    font: Option<FontData>,
    /// Images converted to premultiplied pixmaps, keyed by URL. The source
    /// is kept to notice when the cache replaces a URL's pixels.
    pixmaps: HashMap<String, Converted>,
}

struct Converted {
    source: Arc<DecodedImage>,
    pixmap: Pixmap,
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, font: FontData) -> Self {
        self.font = Some(font);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw(&mut self, pixmap: &mut Pixmap, command: &DrawCommand, images: &ImageCache) {
        match command {
            DrawCommand::Fill {
                path,
                transform,
                color,
            } => fill(pixmap, path, *transform, *color),
            DrawCommand::Stroke {
                path,
                transform,
                color,
                width,
            } => {
                let Some(path) = to_skia_path(path) else {
                    return;
                };
                let stroke = Stroke {
                    width: *width as f32,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint(*color), &stroke, to_transform(*transform), None);
            }
            DrawCommand::Text {
                text,
                origin,
                size,
                baseline,
                transform,
                color,
            } => {
                let path = self.text_path(text, *origin, *size, *baseline);
                fill(pixmap, &path, *transform, *color);
            }
            DrawCommand::Image {
                url,
                rect,
                transform,
            } => self.image(pixmap, url, *rect, *transform, images),
        }
    }

    fn text_path(&self, text: &str, origin: Point, size: f64, baseline: TextBaseline) -> BezPath {
        let (outline, ascent) = match &self.font {
            Some(font) => (font.outline(text, size), font.ascent(size)),
            None => (fallback_outline(text, size), size * FALLBACK_ASCENT),
        };
        let baseline_y = match baseline {
            TextBaseline::Top => origin.y + ascent,
            TextBaseline::Alphabetic => origin.y,
        };
        Affine::translate((origin.x, baseline_y)) * outline
    }

    fn image(
        &mut self,
        pixmap: &mut Pixmap,
        url: &str,
        rect: Rect,
        transform: Affine,
        images: &ImageCache,
    ) {
        let Some(decoded) = images.get(url) else {
            self.pixmaps.remove(url);
            return;
        };
        let stale = self
            .pixmaps
            .get(url)
            .is_none_or(|converted| !Arc::ptr_eq(&converted.source, &decoded));
        if stale {
            let Some(pixmap) = to_pixmap(&decoded) else {
                log::warn!("Skipping empty image ({}x{})", decoded.width, decoded.height);
                self.pixmaps.remove(url);
                return;
            };
            self.pixmaps.insert(
                url.to_string(),
                Converted {
                    source: decoded,
                    pixmap,
                },
            );
        }
        let Some(source) = self.pixmaps.get(url).map(|converted| &converted.pixmap) else {
            return;
        };

        let sx = rect.width() / source.width() as f64;
        let sy = rect.height() / source.height() as f64;
        let placement =
            transform * Affine::translate(rect.origin().to_vec2()) * Affine::scale_non_uniform(sx, sy);
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, to_transform(placement), None);
    }
}

impl SoftwareRenderer {
    /// Drop pixmaps for images the scene no longer draws.
    fn evict_unused(&mut self, scene: &Scene) {
        let drawn: HashSet<&str> = scene
            .commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Image { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        self.pixmaps.retain(|url, _| drawn.contains(url.as_str()));
    }
}

impl Renderer for SoftwareRenderer {
    fn render(&mut self, scene: &Scene, images: &ImageCache) -> RenderResult<Frame> {
        let mut pixmap = Pixmap::new(scene.width, scene.height).ok_or(RendererError::Allocation {
            width: scene.width,
            height: scene.height,
        })?;
        self.evict_unused(scene);
        let bg = scene.background.to_rgba8();
        pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));

        for command in &scene.commands {
            self.draw(&mut pixmap, command, images);
        }

        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok(Frame {
            width: scene.width,
            height: scene.height,
            rgba,
        })
    }
}

fn fill(pixmap: &mut Pixmap, path: &BezPath, transform: Affine, color: Color) {
    if let Some(path) = to_skia_path(path) {
        pixmap.fill_path(&path, &paint(color), FillRule::Winding, to_transform(transform), None);
    }
}

fn paint(color: Color) -> Paint<'static> {
    let c = color.to_rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(c.r, c.g, c.b, c.a);
    paint.anti_alias = true;
    paint
}

fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn to_pixmap(image: &DecodedImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width, image.height)?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.rgba.chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderContext;
    use crate::scene::build_scene;
    use kurbo::Size;
    use syncspace_core::shapes::{SerializableColor, Shape, ShapeKind, ShapeStyle};

    fn solid(kind: ShapeKind, bounds: Rect) -> Shape {
        Shape::new(
            kind,
            bounds,
            ShapeStyle {
                color: SerializableColor::new(255, 0, 0, 255),
                stroke_width: 2.0,
                fill_opacity: 1.0,
            },
        )
    }

    fn render(shapes: &[Shape], images: &ImageCache) -> Frame {
        let ctx = RenderContext::new(shapes, Size::new(100.0, 100.0));
        let scene = build_scene(&ctx, images);
        SoftwareRenderer::new().render(&scene, images).unwrap()
    }

    #[test]
    fn test_background_fill() {
        let frame = render(&[], &ImageCache::new());
        assert_eq!(frame.rgba.len(), 100 * 100 * 4);
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(99, 99), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_filled_rectangle() {
        let shapes = vec![solid(ShapeKind::Rectangle, Rect::new(20.0, 20.0, 60.0, 60.0))];
        let frame = render(&shapes, &ImageCache::new());
        assert_eq!(frame.pixel(40, 40), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(80, 80), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_rotated_line_is_vertical() {
        let mut line = solid(ShapeKind::Line, Rect::new(10.0, 40.0, 90.0, 60.0));
        line.stroke_width = 4.0;
        line.rotation = 90.0;
        let frame = render(&[line], &ImageCache::new());
        // Rotated about (50, 50): runs from (50, 10) to (50, 90).
        assert_eq!(frame.pixel(50, 20), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(20, 50), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_image_is_stretched_over_box() {
        let url = "mem://blue";
        let mut images = ImageCache::new();
        images.insert(
            url,
            DecodedImage {
                width: 2,
                height: 2,
                rgba: [0, 0, 255, 255].repeat(4),
            },
        );
        let image = solid(ShapeKind::Image, Rect::new(10.0, 10.0, 90.0, 90.0)).with_image_url(url);
        let frame = render(&[image], &images);
        let [r, g, b, _] = frame.pixel(50, 50).unwrap();
        assert!(r < 8 && g < 8 && b > 240);
        assert_eq!(frame.pixel(5, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_replaced_image_is_redrawn_and_unused_evicted() {
        let url = "mem://swatch";
        let blue = DecodedImage {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 255, 255],
        };
        let mut images = ImageCache::new();
        images.insert(url, blue);
        let shapes = vec![solid(ShapeKind::Image, Rect::new(10.0, 10.0, 90.0, 90.0)).with_image_url(url)];
        let ctx = RenderContext::new(&shapes, Size::new(100.0, 100.0));
        let mut renderer = SoftwareRenderer::new();

        let frame = renderer.render(&build_scene(&ctx, &images), &images).unwrap();
        let [r, _, b, _] = frame.pixel(50, 50).unwrap();
        assert!(r < 8 && b > 240);

        images.insert(
            url,
            DecodedImage {
                width: 1,
                height: 1,
                rgba: vec![0, 255, 0, 255],
            },
        );
        let frame = renderer.render(&build_scene(&ctx, &images), &images).unwrap();
        let [r, g, b, _] = frame.pixel(50, 50).unwrap();
        assert!(r < 8 && g > 240 && b < 8);
        assert_eq!(renderer.pixmaps.len(), 1);

        let empty: Vec<Shape> = Vec::new();
        let ctx = RenderContext::new(&empty, Size::new(100.0, 100.0));
        renderer.render(&build_scene(&ctx, &images), &images).unwrap();
        assert!(renderer.pixmaps.is_empty());
    }

    #[test]
    fn test_fallback_text_draws_something() {
        let text = solid(ShapeKind::Text, Rect::new(0.0, 0.0, 100.0, 40.0)).with_text("HH");
        let frame = render(&[text], &ImageCache::new());
        let red = frame
            .rgba
            .chunks_exact(4)
            .filter(|px| **px == [255, 0, 0, 255])
            .count();
        assert!(red > 0);
    }

    #[test]
    fn test_allocation_failure() {
        let scene = Scene {
            width: 0,
            height: 10,
            background: Color::WHITE,
            commands: Vec::new(),
            pending_images: Vec::new(),
        };
        assert!(matches!(
            SoftwareRenderer::new().render(&scene, &ImageCache::new()),
            Err(RendererError::Allocation { width: 0, height: 10 })
        ));
    }
}
