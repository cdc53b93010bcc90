//! Per-image compression: pick the codec, run it, keep the smaller payload.
//!
//! ```text
//! JPEG / WebP   render(output) → ImageProcessor::encode(jpeg.quality)
//! PNG           render(output) → codecs::png
//! AVIF          render(output) → codecs::avif
//! GIF           original payload → codecs::gif (every frame, at output size)
//! SVG           original payload → codecs::svg (natural size)
//! ```
//!
//! A codec error, or output that is not strictly smaller than the original,
//! yields [`ImageProcessor::fallback`] with the reason attached. Nothing is
//! retried.

use crate::codecs;
use crate::imaging::{
    Geometry, ImageProcessor, ImagingError, QualityHint, RasterBackend, SourceFormat,
};
use crate::types::ProcessResult;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

/// Why the original content was returned instead of the compressed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The codec failed.
    Failed { message: String },
    /// The codec produced at least as many bytes as the original.
    NotSmaller { original: usize, compressed: usize },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { message } => write!(f, "compression failed: {message}"),
            Self::NotSmaller {
                original,
                compressed,
            } => write!(
                f,
                "compressed output ({compressed} B) is not smaller than the original ({original} B)"
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressOutcome {
    pub result: ProcessResult,
    /// Set when `result` holds the original content.
    pub fallback: Option<FallbackReason>,
}

impl CompressOutcome {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Compress the processor's image according to its options.
pub async fn compress<B: RasterBackend>(processor: &ImageProcessor<B>) -> CompressOutcome {
    let record = processor.record();
    let original = record.content.len();

    let reason = match run_codec(processor).await {
        Ok((geometry, content)) if content.len() < original => {
            info!(
                key = %record.key,
                format = %record.format,
                %geometry,
                original,
                compressed = content.len(),
                "compressed"
            );
            return CompressOutcome {
                result: processor.result(geometry, content, record.format),
                fallback: None,
            };
        }
        Ok((_, content)) => FallbackReason::NotSmaller {
            original,
            compressed: content.len(),
        },
        Err(e) => FallbackReason::Failed {
            message: e.to_string(),
        },
    };

    warn!(key = %record.key, name = %record.name, %reason, "returning original");
    CompressOutcome {
        result: processor.fallback(),
        fallback: Some(reason),
    }
}

async fn run_codec<B: RasterBackend>(
    processor: &ImageProcessor<B>,
) -> Result<(Geometry, Bytes), ImagingError> {
    let record = processor.record();
    let options = processor.options();
    let target = processor.output_geometry();

    let encoded = match record.format {
        SourceFormat::Jpeg | SourceFormat::WebP => {
            let surface = processor.render(target).await?;
            let quality = QualityHint::new(options.jpeg.quality);
            return Ok((target, processor.encode(surface, Some(quality)).await?));
        }
        SourceFormat::Png => {
            let surface = processor.render(target).await?;
            let config = options.png.clone();
            spawn_blocking(move || codecs::png::compress(&surface, &config)).await??
        }
        SourceFormat::Avif => {
            let surface = processor.render(target).await?;
            let config = options.avif.clone();
            spawn_blocking(move || codecs::avif::compress(&surface, &config)).await??
        }
        SourceFormat::Gif => {
            let content = record.content.clone();
            let config = options.gif.clone();
            spawn_blocking(move || codecs::gif::compress(&content, target, &config)).await??
        }
        SourceFormat::Svg => {
            let content = record.content.clone();
            let config = options.svg.clone();
            let minified = spawn_blocking(move || codecs::svg::compress(&content, &config)).await??;
            return Ok((record.natural(), Bytes::from(minified)));
        }
    };
    Ok((target, Bytes::from(encoded)))
}
