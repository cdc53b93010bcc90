//! Format-specific compressors.
//!
//! | Format | Input | Technique |
//! |---|---|---|
//! | PNG | rendered surface | palette quantization + dithering, indexed PNG |
//! | GIF | original payload | per-frame quantization, animation preserved |
//! | AVIF | rendered surface | rav1e with quality and speed |
//! | SVG | original payload | `usvg` re-serialization |
//!
//! JPEG and WebP have no collaborator here; they go through
//! [`ImageProcessor::encode`](crate::imaging::ImageProcessor::encode).
//! Every function is synchronous and is run on the blocking pool by
//! [`compress`](crate::compress).

pub mod avif;
pub mod gif;
pub mod png;
pub mod quantize;
pub mod svg;
