//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom percentage that maps one world unit to one screen pixel.
pub const DEFAULT_ZOOM: f64 = 100.0;
pub const DEFAULT_MIN_ZOOM: f64 = 25.0;
pub const DEFAULT_MAX_ZOOM: f64 = 400.0;
/// Zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 10.0;
/// Zoom change per zoom button press.
pub const BUTTON_ZOOM_STEP: f64 = 25.0;

/// Camera manages the view transform for the canvas.
///
/// Zoom is kept as a percentage so it can be shown in the UI as-is and fed
/// straight into handle hit-testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Screen-space translation applied before scaling.
    pub pan: Vec2,
    /// Zoom level in percent.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera with custom zoom limits.
    pub fn with_limits(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            min_zoom,
            max_zoom: max_zoom.max(min_zoom),
            ..Self::default()
        }
        .clamped()
    }

    fn clamped(mut self) -> Self {
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }

    /// Zoom as a scale factor.
    pub fn scale(&self) -> f64 {
        self.zoom / 100.0
    }

    /// World-to-screen transform: translate by pan, then scale by zoom.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.scale())
    }

    /// Screen-to-world transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale()) * Affine::translate(-self.pan)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Set the zoom percentage, clamped to the limits.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Step zoom by `delta` percent while keeping the world point under
    /// `screen_point` fixed on screen.
    pub fn zoom_at(&mut self, screen_point: Point, delta: f64) {
        let world_point = self.screen_to_world(screen_point);
        self.set_zoom(self.zoom + delta);
        let new_screen = self.world_to_screen(world_point);
        self.pan += screen_point - new_screen;
    }

    /// One wheel notch of zoom; positive `wheel_delta` zooms out, like a
    /// browser wheel.
    pub fn wheel(&mut self, screen_point: Point, wheel_delta: f64) {
        let step = if wheel_delta > 0.0 {
            -WHEEL_ZOOM_STEP
        } else {
            WHEEL_ZOOM_STEP
        };
        self.zoom_at(screen_point, step);
    }

    /// Wheel or trackpad scroll. Zooms while the command modifier is held,
    /// otherwise pans against the scroll direction.
    pub fn scroll(&mut self, screen_point: Point, delta: Vec2, zoom: bool) {
        if zoom {
            self.wheel(screen_point, delta.y);
        } else {
            self.pan_by(-delta);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + BUTTON_ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - BUTTON_ZOOM_STEP);
    }

    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = DEFAULT_ZOOM.clamp(self.min_zoom, self.max_zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_world_conversion() {
        let mut camera = Camera::new();
        camera.pan = Vec2::new(100.0, 50.0);
        camera.set_zoom(200.0);

        let world = camera.screen_to_world(Point::new(300.0, 250.0));
        assert!((world.x - 100.0).abs() < 1e-9);
        assert!((world.y - 100.0).abs() < 1e-9);

        let screen = camera.world_to_screen(world);
        assert!((screen.x - 300.0).abs() < 1e-9);
        assert!((screen.y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_limits() {
        let mut camera = Camera::new();
        camera.set_zoom(1000.0);
        assert_eq!(camera.zoom, 400.0);
        camera.set_zoom(1.0);
        assert_eq!(camera.zoom, 25.0);

        camera.set_zoom(100.0);
        camera.zoom_in();
        assert_eq!(camera.zoom, 125.0);
        camera.zoom_out();
        camera.zoom_out();
        assert_eq!(camera.zoom, 75.0);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut camera = Camera::new();
        let anchor = Point::new(200.0, 120.0);
        let before = camera.screen_to_world(anchor);
        camera.wheel(anchor, -1.0);
        assert_eq!(camera.zoom, 110.0);
        let after = camera.screen_to_world(anchor);
        assert!((before - after).hypot() < 1e-9);
    }

    #[test]
    fn test_scroll_pans_unless_zooming() {
        let mut camera = Camera::new();
        camera.scroll(Point::ZERO, Vec2::new(15.0, 40.0), false);
        assert_eq!(camera.pan, Vec2::new(-15.0, -40.0));
        assert_eq!(camera.zoom, 100.0);

        camera.scroll(Point::ZERO, Vec2::new(15.0, 40.0), true);
        assert_eq!(camera.zoom, 90.0);
        camera.set_zoom(400.0);
        camera.scroll(Point::ZERO, Vec2::new(0.0, -3.0), true);
        assert_eq!(camera.zoom, 400.0);
    }
}
