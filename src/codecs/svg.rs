//! SVG minification: parse with `usvg`, write back compact.
//!
//! `usvg` normalizes the document while parsing, so comments, editor
//! metadata, and unused definitions do not survive the round trip.

use crate::config::SvgConfig;
use crate::imaging::ImagingError;
use crate::imaging::svg::parse_tree;
use resvg::usvg;
use xmlwriter::Indent;

/// Re-serialize `content` without indentation at the configured precision.
pub fn compress(content: &[u8], config: &SvgConfig) -> Result<Vec<u8>, ImagingError> {
    let tree = parse_tree(content)?;
    let options = usvg::WriteOptions {
        indent: Indent::None,
        attributes_indent: Indent::None,
        coordinates_precision: config.precision,
        transforms_precision: config.precision,
        preserve_text: true,
        ..usvg::WriteOptions::default()
    };
    Ok(tree.to_string(&options).into_bytes())
}
