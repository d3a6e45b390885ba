//! Renderer trait abstraction.

use crate::image_cache::ImageCache;
use crate::scene::Scene;
use kurbo::Size;
use peniko::Color;
use syncspace_core::camera::Camera;
use syncspace_core::interaction::Preview;
use syncspace_core::presence::Collaborator;
use syncspace_core::session::Session;
use syncspace_core::shapes::{Shape, ShapeId, ShapeStyle};
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("cannot allocate a {width}x{height} frame")]
    Allocation { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    #[error("font parsing failed: {0}")]
    Font(String),
    #[error("image decoding failed: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Selection highlight color (#3B82F6).
pub const SELECTION_COLOR: Color = Color::from_rgba8(59, 130, 246, 255);
pub const DEFAULT_BACKGROUND: Color = Color::from_rgba8(255, 255, 255, 255);

/// A finished frame: straight (not premultiplied) RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    /// RGBA at a pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.rgba.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Everything one frame is drawn from. Nothing here is mutated.
pub struct RenderContext<'a> {
    pub shapes: &'a [Shape],
    /// Selected ids in z-order.
    pub selection: Vec<ShapeId>,
    pub camera: Camera,
    /// Drawing gesture in progress.
    pub preview: Option<Preview<'a>>,
    /// Style the preview is painted with.
    pub preview_style: ShapeStyle,
    pub collaborators: &'a [Collaborator],
    /// Viewport size in logical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio.
    pub scale_factor: f64,
    pub background_color: Color,
    pub selection_color: Color,
}

impl<'a> RenderContext<'a> {
    pub fn new(shapes: &'a [Shape], viewport_size: Size) -> Self {
        Self {
            shapes,
            selection: Vec::new(),
            camera: Camera::default(),
            preview: None,
            preview_style: ShapeStyle::default(),
            collaborators: &[],
            viewport_size,
            scale_factor: 1.0,
            background_color: DEFAULT_BACKGROUND,
            selection_color: SELECTION_COLOR,
        }
    }

    /// Context for the current state of a session.
    pub fn for_session(session: &'a Session, viewport_size: Size) -> Self {
        let interaction = session.interaction();
        Self::new(session.store().shapes(), viewport_size)
            .with_selection(session.store().selected_ids())
            .with_camera(session.camera().clone())
            .with_preview(interaction.preview(), interaction.style())
            .with_collaborators(session.collaborators())
    }

    pub fn with_selection(mut self, selection: Vec<ShapeId>) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_preview(mut self, preview: Option<Preview<'a>>, style: ShapeStyle) -> Self {
        self.preview = preview;
        self.preview_style = style;
        self
    }

    pub fn with_collaborators(mut self, collaborators: &'a [Collaborator]) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub(crate) fn is_selected(&self, id: &ShapeId) -> bool {
        self.selection.contains(id)
    }

    /// Frame size in physical pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let w = (self.viewport_size.width * self.scale_factor).round().max(1.0);
        let h = (self.viewport_size.height * self.scale_factor).round().max(1.0);
        (w as u32, h as u32)
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Rasterize a built scene.
    fn render(&mut self, scene: &Scene, images: &ImageCache) -> RenderResult<Frame>;
}
