//! # pixpress
//!
//! Local image compression for one image at a time: resize, re-encode, and
//! keep whichever of the result and the original is smaller. JPEG, PNG, GIF,
//! AVIF, SVG, and WebP inputs go through a single pipeline.
//!
//! # Pipeline
//!
//! ```text
//! bytes ──► ImageRecord::load        detect format, measure, derive locator
//!              │
//!              ▼
//!        ImageProcessor              record + options, one per run
//!              │  output_geometry / preview_geometry   (pure)
//!              │  render ──► Surface ──► encode        (blocking pool)
//!              ▼
//!        compress                    per-format codec, fallback to original
//!              │
//!              ▼
//!        ProcessResult               width, height, content, locator
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry math, raster backend trait + `RustBackend`, the async `ImageProcessor` |
//! | [`codecs`] | PNG, GIF, AVIF, and SVG compressors |
//! | [`compress`] | Per-image orchestration and the fallback policy |
//! | [`config`] | `CompressionOptions`: TOML loading, layering, validation |
//! | [`locator`] | `data:` and `blob:` locators for payloads |
//! | [`types`] | `ImageRecord` and `ProcessResult` |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Handles Are Values
//!
//! Decoded bitmaps and drawing surfaces each carry a guard from the
//! backend's handle ledger. Releasing one is dropping it, so a failed draw
//! or encode cannot leave a handle open, and tests can check the ledger
//! count after every path.
//!
//! ## Never Worse Than the Input
//!
//! [`compress::compress`] returns the original bytes whenever a codec
//! fails or its output is not strictly smaller. The reason travels with the
//! outcome so callers can report it; the processor itself never falls back.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and encoding use the `image` crate family, `rav1d`/`rav1e` for
//! AVIF, and `resvg` for SVG. There are no system libraries to install.

pub mod codecs;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod locator;
pub mod output;
pub mod types;
