//! Render a saved shape list to a PNG without opening a window.

use clap::Parser;
use std::path::PathBuf;
use syncspace_core::shapes::Shape;
use syncspace_render::{
    CanvasExportError, DEFAULT_EXPORT_FILENAME, FontData, ImageCache, RenderContext, Renderer,
    SoftwareRenderer, build_scene, content_bounds, fit_to_content, write_png,
};

#[derive(Parser, Debug)]
#[command(name = "syncspace-export", about = "Render a SyncSpace shape snapshot to PNG")]
struct Cli {
    /// JSON array of shapes, as stored for a project.
    snapshot: PathBuf,

    #[arg(short, long, default_value = DEFAULT_EXPORT_FILENAME)]
    output: PathBuf,

    /// TTF/OTF used for text. Text renders as blocks without one.
    #[arg(long, env = "SYNCSPACE_FONT")]
    font: Option<PathBuf>,

    /// World units of padding around the content.
    #[arg(long, default_value_t = 20.0)]
    margin: f64,

    /// Device pixel ratio of the output.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

fn main() -> Result<(), CanvasExportError> {
    env_logger::init();
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.snapshot)?;
    let shapes: Vec<Shape> = serde_json::from_str(&text)?;
    let bounds = content_bounds(&shapes).ok_or(CanvasExportError::Empty)?;
    let (viewport, camera) = fit_to_content(bounds, cli.margin);

    let mut renderer = SoftwareRenderer::new();
    if let Some(path) = &cli.font {
        renderer = renderer.with_font(FontData::from_file(path)?);
    }

    let mut images = ImageCache::new();
    let ctx = RenderContext::new(&shapes, viewport)
        .with_camera(camera)
        .with_scale_factor(cli.scale);
    // Decode embedded images up front; remote URLs stay unrendered.
    let pending = build_scene(&ctx, &images).pending_images;
    images.decode_pending(&pending);

    let scene = build_scene(&ctx, &images);
    let frame = renderer.render(&scene, &images)?;
    write_png(&frame, &cli.output)?;
    log::info!(
        "wrote {}x{} image with {} shapes to {}",
        frame.width,
        frame.height,
        shapes.len(),
        cli.output.display()
    );
    Ok(())
}
