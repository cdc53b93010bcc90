//! Parameter types for image operations.
//!
//! These describe *what* is being processed, not *how*. They sit between the
//! [`processor`](super::processor) (which decides what to render and encode)
//! and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`SourceFormat`]: detected format of an input payload, from its MIME
//!   type, file extension, or magic bytes.
//! - [`QualityHint`]: a `0.0..=1.0` quality for generic lossy
//!   encoders (default 0.6). Clamped on construction.

use image::ImageFormat;
use serde::Serialize;

/// Image formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Avif,
    Svg,
    WebP,
}

/// Extension table, lowercase. Order matters for [`SourceFormat::extension`].
const EXTENSIONS: &[(&str, SourceFormat)] = &[
    ("jpg", SourceFormat::Jpeg),
    ("jpeg", SourceFormat::Jpeg),
    ("png", SourceFormat::Png),
    ("gif", SourceFormat::Gif),
    ("avif", SourceFormat::Avif),
    ("svg", SourceFormat::Svg),
    ("webp", SourceFormat::WebP),
];

impl SourceFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Avif => "image/avif",
            Self::Svg => "image/svg+xml",
            Self::WebP => "image/webp",
        }
    }

    /// Canonical file extension (no dot).
    pub fn extension(self) -> &'static str {
        EXTENSIONS
            .iter()
            .find(|(_, fmt)| *fmt == self)
            .map(|(ext, _)| *ext)
            .unwrap_or("bin")
    }

    /// Parse a declared MIME type. Parameters (`; charset=...`) are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/avif" => Some(Self::Avif),
            "image/svg+xml" => Some(Self::Svg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, fmt)| *fmt)
    }

    /// Detect the format from the payload itself.
    ///
    /// Raster formats go through `image::guess_format`; SVG is recognized by
    /// an `<svg` root within the first kilobyte (after an optional XML
    /// declaration, doctype or comments).
    pub fn sniff(content: &[u8]) -> Option<Self> {
        if let Ok(format) = image::guess_format(content) {
            return match format {
                ImageFormat::Jpeg => Some(Self::Jpeg),
                ImageFormat::Png => Some(Self::Png),
                ImageFormat::Gif => Some(Self::Gif),
                ImageFormat::Avif => Some(Self::Avif),
                ImageFormat::WebP => Some(Self::WebP),
                _ => None,
            };
        }
        let head = &content[..content.len().min(1024)];
        let text = String::from_utf8_lossy(head);
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('<') && text.contains("<svg") {
            return Some(Self::Svg);
        }
        None
    }

    /// Resolve a format from a declared MIME type, falling back to sniffing.
    pub fn detect(declared_mime: Option<&str>, content: &[u8]) -> Option<Self> {
        declared_mime
            .and_then(Self::from_mime)
            .or_else(|| Self::sniff(content))
    }

    pub fn is_vector(self) -> bool {
        self == Self::Svg
    }

    /// Format a rendered surface of this source is written back as.
    ///
    /// Vector sources have no raster encoder of their own and come out as PNG.
    pub fn surface_format(self) -> Self {
        if self.is_vector() { Self::Png } else { self }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Avif => "AVIF",
            Self::Svg => "SVG",
            Self::WebP => "WebP",
        })
    }
}

/// Quality scalar for generic lossy encoders, `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityHint(f64);

impl QualityHint {
    pub const DEFAULT: QualityHint = QualityHint(0.6);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::DEFAULT;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Map onto the `1..=100` scale the `image` crate encoders take.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl Default for QualityHint {
    fn default() -> Self {
        Self::DEFAULT
    }
}
