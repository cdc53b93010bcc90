//! GIF: per-frame palette quantization with animation preserved.
//!
//! Frames are decoded from the original payload (the raster backend only
//! ever sees the first frame), resized to the output geometry, and written
//! back with local palettes, their original delays, and infinite looping.

use super::quantize::quantize;
use crate::config::GifConfig;
use crate::imaging::{Geometry, ImagingError, check_surface_size};
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, RgbaImage};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Alpha below this becomes fully transparent; GIF has no partial alpha.
const ALPHA_THRESHOLD: u8 = 128;

struct DecodedFrame {
    pixels: RgbaImage,
    /// Hundredths of a second.
    delay: u16,
}

fn decode_frames(content: &[u8]) -> Result<Vec<DecodedFrame>, ImagingError> {
    let decode_failed = |e: image::ImageError| ImagingError::Decode(format!("Failed to decode GIF: {e}"));
    let decoder = GifDecoder::new(Cursor::new(content)).map_err(decode_failed)?;
    let frames = decoder.into_frames().collect_frames().map_err(decode_failed)?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let ms = if denom == 0 { 0 } else { numer / denom };
            DecodedFrame {
                delay: (ms / 10).min(u16::MAX as u32) as u16,
                pixels: frame.into_buffer(),
            }
        })
        .collect())
}

fn binarize_alpha(pixels: &mut RgbaImage) {
    for pixel in pixels.pixels_mut() {
        pixel.0 = if pixel.0[3] < ALPHA_THRESHOLD {
            [0, 0, 0, 0]
        } else {
            [pixel.0[0], pixel.0[1], pixel.0[2], 255]
        };
    }
}

/// Quantize one binarized frame into GIF indices and an RGB palette.
///
/// Frames with transparent pixels get a dedicated entry appended after the
/// quantized colors, and every transparent pixel is pointed at it.
fn index_frame(pixels: &RgbaImage, colors: u16, dithering: f32) -> (Vec<u8>, Vec<u8>, Option<u8>) {
    let has_transparency = pixels.pixels().any(|p| p.0[3] == 0);
    let budget = if has_transparency { colors.saturating_sub(1) } else { colors };
    let mut indexed = quantize(pixels, budget, dithering);

    let transparent = if has_transparency {
        let slot = indexed.palette.len() as u8;
        indexed.palette.push([0, 0, 0, 0]);
        for (index, pixel) in indexed.indices.iter_mut().zip(pixels.pixels()) {
            if pixel.0[3] == 0 {
                *index = slot;
            }
        }
        Some(slot)
    } else {
        None
    };

    let palette = indexed.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    (indexed.indices, palette, transparent)
}

fn encode_frames(
    frames: &[DecodedFrame],
    target: Geometry,
    config: &GifConfig,
) -> Result<Vec<u8>, gif::EncodingError> {
    let dithering = if config.dithering { 1.0 } else { 0.0 };
    let mut buf = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut buf, target.width as u16, target.height as u16, &[])?;
        encoder.set_repeat(gif::Repeat::Infinite)?;

        for decoded in frames {
            let mut pixels = if decoded.pixels.dimensions() == (target.width, target.height) {
                decoded.pixels.clone()
            } else {
                imageops::resize(&decoded.pixels, target.width, target.height, FilterType::Lanczos3)
            };
            binarize_alpha(&mut pixels);

            let (indices, palette, transparent) = index_frame(&pixels, config.colors, dithering);

            let frame = gif::Frame {
                width: target.width as u16,
                height: target.height as u16,
                delay: decoded.delay,
                dispose: gif::DisposalMethod::Background,
                transparent,
                palette: Some(palette),
                buffer: Cow::Owned(indices),
                ..gif::Frame::default()
            };
            encoder.write_frame(&frame)?;
        }
    }
    Ok(buf)
}

/// Re-encode every frame of `content` at `target` with reduced palettes.
pub fn compress(content: &[u8], target: Geometry, config: &GifConfig) -> Result<Vec<u8>, ImagingError> {
    if target.is_empty() || target.width > u16::MAX as u32 || target.height > u16::MAX as u32 {
        return Err(ImagingError::Encode(format!(
            "GIF cannot hold a {target} canvas"
        )));
    }

    check_surface_size(target)?;

    let frames = decode_frames(content)?;
    if frames.is_empty() {
        return Err(ImagingError::Decode("GIF contains no frames".into()));
    }
    debug!(frames = frames.len(), %target, "re-encoding GIF");

    encode_frames(&frames, target, config)
        .map_err(|e| ImagingError::Encode(format!("GIF encode failed: {e}")))
}
