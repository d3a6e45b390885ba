//! PNG export of rendered frames.

use crate::renderer::{Frame, RenderResult, RendererError};
use kurbo::{Rect, Size, Vec2};
use std::path::Path;
use syncspace_core::camera::Camera;
use syncspace_core::shapes::Shape;
use thiserror::Error;

pub const DEFAULT_EXPORT_FILENAME: &str = "syncspace-canvas.png";

/// Failures of the offline snapshot export.
#[derive(Debug, Error)]
pub enum CanvasExportError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Render(#[from] RendererError),
    #[error("snapshot has no visible shapes")]
    Empty,
}

/// Encode a frame as an 8-bit RGBA PNG.
pub fn encode_png(frame: &Frame) -> RenderResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| RendererError::Encode(e.to_string()))?;
        writer
            .write_image_data(&frame.rgba)
            .map_err(|e| RendererError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| RendererError::Encode(e.to_string()))?;
    }
    Ok(out)
}

pub fn write_png(frame: &Frame, path: impl AsRef<Path>) -> RenderResult<()> {
    let bytes = encode_png(frame)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Union of the visible shapes' boxes, or `None` for an empty canvas.
pub fn content_bounds(shapes: &[Shape]) -> Option<Rect> {
    shapes
        .iter()
        .filter(|s| s.visible)
        .map(|s| s.bounds())
        .reduce(|acc, r| acc.union(r))
}

/// Viewport size and camera that frame `bounds` with `margin` world units
/// on every side at 100% zoom.
pub fn fit_to_content(bounds: Rect, margin: f64) -> (Size, Camera) {
    let framed = bounds.inflate(margin, margin);
    let mut camera = Camera::new();
    camera.pan_by(Vec2::new(-framed.x0, -framed.y0));
    (framed.size(), camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncspace_core::shapes::{ShapeKind, ShapeStyle};

    #[test]
    fn test_png_signature_and_roundtrip() {
        let frame = Frame {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 128],
        };
        let bytes = encode_png(&frame).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.into_raw(), frame.rgba);
    }

    #[test]
    fn test_write_png_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_EXPORT_FILENAME);
        let frame = Frame {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 255],
        };
        write_png(&frame, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 8);
    }

    #[test]
    fn test_mismatched_buffer_is_an_error() {
        let frame = Frame {
            width: 4,
            height: 4,
            rgba: vec![0; 3],
        };
        assert!(matches!(encode_png(&frame), Err(RendererError::Encode(_))));
    }

    #[test]
    fn test_content_bounds_and_fit() {
        assert_eq!(content_bounds(&[]), None);

        let a = Shape::new(ShapeKind::Rectangle, Rect::new(10.0, 10.0, 50.0, 50.0), ShapeStyle::default());
        let b = Shape::new(ShapeKind::Circle, Rect::new(100.0, 0.0, 120.0, 30.0), ShapeStyle::default());
        let mut hidden = a.clone();
        hidden.x = -500.0;
        hidden.visible = false;
        let bounds = content_bounds(&[a, b, hidden]).unwrap();
        assert_eq!(bounds, Rect::new(10.0, 0.0, 120.0, 50.0));

        let (size, camera) = fit_to_content(bounds, 20.0);
        assert_eq!(size, Size::new(150.0, 90.0));
        assert_eq!(camera.world_to_screen(kurbo::Point::new(-10.0, -20.0)), kurbo::Point::ZERO);
    }
}
