//! SyncSpace Render Library
//!
//! Turns session state into a display list and rasterizes it on the CPU
//! with tiny-skia. Frames can be written out as PNG.

mod export;
mod image_cache;
mod raster;
mod renderer;
mod scene;
pub mod text;
mod view;

pub use export::{
    CanvasExportError, DEFAULT_EXPORT_FILENAME, content_bounds, encode_png, fit_to_content,
    write_png,
};
pub use image_cache::{DecodedImage, ImageCache, decode_data_url};
pub use raster::SoftwareRenderer;
pub use renderer::{
    DEFAULT_BACKGROUND, Frame, RenderContext, RenderResult, Renderer, RendererError,
    SELECTION_COLOR,
};
pub use scene::{DrawCommand, Scene, TextBaseline, build_scene, shape_transform};
pub use text::FontData;
pub use view::CanvasView;
