//! Text outlines for the software rasterizer.
//!
//! A TTF/OTF face can be loaded at runtime. Without one, text renders as
//! blocks with the same advance [`estimate_width`] assumes.

use crate::renderer::{RenderResult, RendererError};
use kurbo::{BezPath, Point, RoundedRect, Shape as _};
use std::path::Path;
use ttf_parser::{Face, OutlineBuilder};

/// Advance of one character in ems when no font metrics are available.
pub const FALLBACK_ADVANCE: f64 = 0.6;
/// Ascent in ems when no font metrics are available.
pub const FALLBACK_ASCENT: f64 = 0.8;

/// Rough text width, used for name tags.
pub fn estimate_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * FALLBACK_ADVANCE
}

/// Block glyphs with their baseline on y = 0.
pub fn fallback_outline(text: &str, size: f64) -> BezPath {
    let mut path = BezPath::new();
    let advance = size * FALLBACK_ADVANCE;
    let inset = size * 0.08;
    let top = -size * 0.7;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let x = i as f64 * advance;
        let block = RoundedRect::new(x + inset, top, x + advance - inset, 0.0, size * 0.05);
        path.extend(block.path_elements(0.1));
    }
    path
}

/// A parsed font face kept as raw bytes.
#[derive(Debug, Clone)]
pub struct FontData {
    bytes: Vec<u8>,
}

impl FontData {
    /// Validate and keep a font.
    pub fn from_bytes(bytes: Vec<u8>) -> RenderResult<Self> {
        Face::parse(&bytes, 0).map_err(|e| RendererError::Font(e.to_string()))?;
        Ok(Self { bytes })
    }

    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.bytes, 0).ok()
    }

    /// Distance from the top of the em box to the baseline.
    pub fn ascent(&self, size: f64) -> f64 {
        match self.face() {
            Some(face) => face.ascender() as f64 * size / face.units_per_em() as f64,
            None => size * FALLBACK_ASCENT,
        }
    }

    /// Glyph outlines with the baseline on y = 0 and y growing downward.
    pub fn outline(&self, text: &str, size: f64) -> BezPath {
        let Some(face) = self.face() else {
            return fallback_outline(text, size);
        };
        let mut sink = PathSink {
            path: BezPath::new(),
            scale: size / face.units_per_em() as f64,
            pen_x: 0.0,
        };
        for ch in text.chars() {
            match face.glyph_index(ch) {
                Some(id) => {
                    face.outline_glyph(id, &mut sink);
                    let advance = face.glyph_hor_advance(id).unwrap_or(0) as f64 * sink.scale;
                    sink.pen_x += advance;
                }
                None => sink.pen_x += size * FALLBACK_ADVANCE,
            }
        }
        sink.path
    }
}

/// Flips font units (y up) into a y-down path at the pen position.
struct PathSink {
    path: BezPath,
    scale: f64,
    pen_x: f64,
}

impl PathSink {
    fn map(&self, x: f32, y: f32) -> Point {
        Point::new(self.pen_x + x as f64 * self.scale, -(y as f64) * self.scale)
    }
}

impl OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.move_to(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (c, p) = (self.map(x1, y1), self.map(x, y));
        self.path.quad_to(c, p);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (c1, c2, p) = (self.map(x1, y1), self.map(x2, y2), self.map(x, y));
        self.path.curve_to(c1, c2, p);
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}
