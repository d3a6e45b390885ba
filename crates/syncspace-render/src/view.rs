//! Glue between a [`Session`] and a renderer.

use crate::export::{DEFAULT_EXPORT_FILENAME, write_png};
use crate::image_cache::ImageCache;
use crate::raster::SoftwareRenderer;
use crate::renderer::{Frame, RenderContext, RenderResult, Renderer};
use crate::scene::build_scene;
use kurbo::Size;
use std::path::Path;
use syncspace_core::session::{Notification, Session};

/// Owns the renderer and decoded images for one canvas.
pub struct CanvasView<R: Renderer = SoftwareRenderer> {
    renderer: R,
    images: ImageCache,
    viewport: Size,
    scale_factor: f64,
}

impl CanvasView<SoftwareRenderer> {
    pub fn new(viewport: Size) -> Self {
        Self::with_renderer(SoftwareRenderer::new(), viewport)
    }
}

impl<R: Renderer> CanvasView<R> {
    pub fn with_renderer(renderer: R, viewport: Size) -> Self {
        Self {
            renderer,
            images: ImageCache::new(),
            viewport,
            scale_factor: 1.0,
        }
    }

    pub fn resize(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageCache {
        &mut self.images
    }

    /// Draw the session's current state.
    ///
    /// Images that were still loading are decoded afterwards and the
    /// session is asked to redraw, so they show up on the next frame.
    pub fn render(&mut self, session: &mut Session) -> RenderResult<Frame> {
        let (frame, pending) = {
            let ctx = RenderContext::for_session(session, self.viewport)
                .with_scale_factor(self.scale_factor);
            let scene = build_scene(&ctx, &self.images);
            (self.renderer.render(&scene, &self.images)?, scene.pending_images)
        };
        if !pending.is_empty() && self.images.decode_pending(&pending) > 0 {
            session.request_redraw();
        }
        Ok(frame)
    }

    /// Render the viewport and write it as a PNG.
    pub fn export_png(&mut self, session: &mut Session, path: impl AsRef<Path>) -> RenderResult<()> {
        let frame = self.render(session)?;
        match write_png(&frame, path.as_ref()) {
            Ok(()) => {
                log::info!("exported canvas to {}", path.as_ref().display());
                session.notify(Notification::info("Canvas exported!"));
                Ok(())
            }
            Err(e) => {
                log::error!("export failed: {e}");
                session.notify(Notification::error(format!("Export failed: {e}")));
                Err(e)
            }
        }
    }

    /// Export under the default file name inside `dir`.
    pub fn export_png_to_dir(&mut self, session: &mut Session, dir: impl AsRef<Path>) -> RenderResult<()> {
        self.export_png(session, dir.as_ref().join(DEFAULT_EXPORT_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::{ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::Arc;
    use syncspace_core::config::SessionConfig;
    use syncspace_core::session::NotificationKind;
    use syncspace_core::storage::MemoryStore;

    fn session() -> Session {
        let durable = Arc::new(MemoryStore::new());
        Session::open(SessionConfig::default(), durable, None).unwrap()
    }

    fn png_data_url() -> String {
        let buffer = ImageBuffer::from_pixel(4, 4, Rgba([0u8, 128, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        buffer.write_to(&mut out, ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
    }

    #[test]
    fn test_render_session_frame() {
        let mut session = session();
        let mut view = CanvasView::new(Size::new(64.0, 48.0));
        view.set_scale_factor(2.0);
        let frame = view.render(&mut session).unwrap();
        assert_eq!((frame.width, frame.height), (128, 96));
    }

    #[test]
    fn test_pending_image_requests_redraw() {
        let mut session = session();
        session.insert_image(png_data_url(), 4.0, 4.0);
        session.on_frame();
        let tick = session.tick();

        let mut view = CanvasView::new(Size::new(200.0, 200.0));
        let first = view.render(&mut session).unwrap();
        // Not decoded on the first pass.
        assert_eq!(first.pixel(102, 102), Some([255, 255, 255, 255]));
        assert!(session.tick() > tick);
        assert_eq!(view.images().len(), 1);

        let second = view.render(&mut session).unwrap();
        let [r, g, b, _] = second.pixel(102, 102).unwrap();
        assert!(r < 16 && b < 16 && g > 100);
    }

    #[test]
    fn test_export_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session();
        let mut view = CanvasView::new(Size::new(10.0, 10.0));
        view.export_png_to_dir(&mut session, dir.path()).unwrap();
        assert!(dir.path().join(DEFAULT_EXPORT_FILENAME).exists());

        let notes = session.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Info);
        assert_eq!(notes[0].message, "Canvas exported!");
    }

    #[test]
    fn test_export_failure_notifies() {
        let mut session = session();
        let mut view = CanvasView::new(Size::new(10.0, 10.0));
        assert!(view.export_png(&mut session, "/nonexistent-dir/out.png").is_err());
        let notes = session.take_notifications();
        assert_eq!(notes[0].kind, NotificationKind::Error);
    }
}
