//! Lossy PNG: palette quantization written as an indexed PNG.

use super::quantize::{IndexedImage, quantize};
use crate::config::PngConfig;
use crate::imaging::{ImagingError, Surface};
use tracing::debug;

/// Pack one-byte indices into rows of `bits`-wide samples, MSB first.
fn pack_rows(indexed: &IndexedImage, bits: u8) -> Vec<u8> {
    if bits == 8 {
        return indexed.indices.clone();
    }
    let width = indexed.width as usize;
    let per_byte = (8 / bits) as usize;
    let row_bytes = width.div_ceil(per_byte);
    let mut packed = vec![0u8; row_bytes * indexed.height as usize];

    for (row, chunk) in indexed.indices.chunks_exact(width).enumerate() {
        let out = &mut packed[row * row_bytes..(row + 1) * row_bytes];
        for (x, &idx) in chunk.iter().enumerate() {
            let shift = 8 - bits as usize * (x % per_byte + 1);
            out[x / per_byte] |= idx << shift;
        }
    }
    packed
}

fn write_indexed(indexed: &IndexedImage) -> Result<Vec<u8>, png::EncodingError> {
    let bits = indexed.bit_depth();
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, indexed.width, indexed.height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(match bits {
            1 => png::BitDepth::One,
            2 => png::BitDepth::Two,
            4 => png::BitDepth::Four,
            _ => png::BitDepth::Eight,
        });
        encoder.set_compression(png::Compression::Best);

        let rgb: Vec<u8> = indexed.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
        encoder.set_palette(rgb);
        if indexed.has_transparency() {
            // tRNS may stop at the last non-opaque entry
            let last = indexed.palette.iter().rposition(|c| c[3] < 255).unwrap_or(0);
            let alpha: Vec<u8> = indexed.palette[..=last].iter().map(|c| c[3]).collect();
            encoder.set_trns(alpha);
        }

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pack_rows(indexed, bits))?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Quantize a rendered surface and write it as an indexed PNG.
pub fn compress(surface: &Surface, config: &PngConfig) -> Result<Vec<u8>, ImagingError> {
    let geometry = surface.geometry();
    if geometry.is_empty() {
        return Err(ImagingError::Encode(format!(
            "Cannot encode an empty {geometry} surface"
        )));
    }

    let indexed = quantize(surface.pixels(), config.colors, config.dithering);
    debug!(
        colors = indexed.palette.len(),
        bit_depth = indexed.bit_depth(),
        "quantized PNG"
    );
    write_indexed(&indexed).map_err(|e| ImagingError::Encode(format!("PNG encode failed: {e}")))
}
