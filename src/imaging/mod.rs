//! Image processing core.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions`, `avif-parse`, `usvg` |
//! | **Decode** | `image` (JPEG/PNG/GIF/WebP), `rav1d` (AVIF), `resvg` (SVG) |
//! | **Draw** | Lanczos3 `resize_exact` onto an RGBA surface |
//! | **Encode** | `image` encoders (JPEG, PNG, WebP, GIF, rav1e AVIF) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry math (unit testable)
//! - **Parameters**: Source formats and quality hints
//! - **Backend**: [`RasterBackend`] trait, handle ledger, [`RustBackend`]
//! - **Processor**: [`ImageProcessor`], the async per-image pipeline

pub mod backend;
mod calculations;
mod params;
pub mod processor;
pub mod rust_backend;
pub mod svg;

pub use backend::{
    Bitmap, HandleGuard, HandleLedger, ImagingError, MAX_SURFACE_PIXELS, RasterBackend, Surface,
    check_surface_size,
};
pub use calculations::{
    Geometry, ResizeMethod, calculate_output_geometry, calculate_preview_geometry,
};
pub use params::{QualityHint, SourceFormat};
pub use processor::ImageProcessor;
pub use rust_backend::{RustBackend, supported_formats};
