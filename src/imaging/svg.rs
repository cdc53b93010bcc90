//! SVG parsing and rasterization via `resvg`.

use super::backend::{ImagingError, check_surface_size};
use super::calculations::Geometry;
use image::RgbaImage;
use resvg::{tiny_skia, usvg};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// System fonts, loaded once. `usvg` drops `<text>` it cannot lay out.
static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!(faces = db.len(), "loaded system fonts for SVG text");
    Arc::new(db)
});

/// Parse an SVG document with system fonts available for text.
pub fn parse_tree(content: &[u8]) -> Result<usvg::Tree, ImagingError> {
    let options = usvg::Options {
        fontdb: Arc::clone(&FONTS),
        ..usvg::Options::default()
    };
    parse_with(content, &options)
}

fn parse_with(content: &[u8], options: &usvg::Options) -> Result<usvg::Tree, ImagingError> {
    let tree = usvg::Tree::from_data(content, options)
        .map_err(|e| ImagingError::Decode(format!("Failed to parse SVG: {e}")))?;
    ensure_text_kept(content, &tree)?;
    Ok(tree)
}

fn contains_text(group: &usvg::Group) -> bool {
    group.children().iter().any(|node| match node {
        usvg::Node::Text(_) => true,
        usvg::Node::Group(group) => contains_text(group),
        _ => false,
    })
}

/// Fail when the source has `<text>` but none of it survived parsing.
fn ensure_text_kept(content: &[u8], tree: &usvg::Tree) -> Result<(), ImagingError> {
    let has_source_text = content.windows(5).any(|w| w == b"<text");
    if has_source_text && !contains_text(tree.root()) {
        return Err(ImagingError::Decode(
            "SVG text could not be laid out with the available fonts".into(),
        ));
    }
    Ok(())
}

/// Document size, rounded up to whole pixels.
pub fn natural_geometry(tree: &usvg::Tree) -> Result<Geometry, ImagingError> {
    let size = tree.size();
    let width = size.width().ceil();
    let height = size.height().ceil();
    if !(width >= 1.0 && height >= 1.0) {
        return Err(ImagingError::Decode(format!(
            "SVG has no usable size ({}x{})",
            size.width(),
            size.height()
        )));
    }
    Ok(Geometry::new(width as u32, height as u32))
}

/// Rasterize the whole document stretched over `target`.
pub fn rasterize(tree: &usvg::Tree, target: Geometry) -> Result<RgbaImage, ImagingError> {
    check_surface_size(target)?;
    let mut pixmap = tiny_skia::Pixmap::new(target.width, target.height).ok_or_else(|| {
        ImagingError::Decode(format!("Cannot allocate a {target} SVG canvas"))
    })?;

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        target.width as f32 / size.width(),
        target.height as f32 / size.height(),
    );
    resvg::render(tree, transform, &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(target.width, target.height, rgba)
        .ok_or_else(|| ImagingError::Decode("SVG raster buffer size mismatch".into()))
}
