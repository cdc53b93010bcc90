//! Palette quantization shared by the PNG and GIF codecs.
//!
//! Images that already fit in the palette budget keep their exact colors.
//! Everything else goes through NeuQuant, optionally with Floyd–Steinberg
//! error diffusion scaled by a `0.0..=1.0` dithering level.

use color_quant::NeuQuant;
use image::RgbaImage;
use std::collections::HashMap;

/// NeuQuant sampling factor: 1 = best quality, 30 = fastest.
const SAMPLE_FACTOR: i32 = 10;

/// Below this many pixels NeuQuant samples every pixel.
const FULL_SAMPLE_PIXELS: usize = 4096;

/// A palette image: one index byte per pixel, RGBA palette entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl IndexedImage {
    /// Smallest PNG bit depth that can address every palette entry.
    pub fn bit_depth(&self) -> u8 {
        match self.palette.len() {
            0..=2 => 1,
            3..=4 => 2,
            5..=16 => 4,
            _ => 8,
        }
    }

    pub fn has_transparency(&self) -> bool {
        self.palette.iter().any(|c| c[3] < 255)
    }
}

/// Collect the exact palette, or `None` once more than `max` colors show up.
fn exact_palette(image: &RgbaImage, max: usize) -> Option<(Vec<[u8; 4]>, HashMap<[u8; 4], u8>)> {
    let mut palette = Vec::new();
    let mut lookup = HashMap::new();
    for pixel in image.pixels() {
        if !lookup.contains_key(&pixel.0) {
            if palette.len() == max {
                return None;
            }
            lookup.insert(pixel.0, palette.len() as u8);
            palette.push(pixel.0);
        }
    }
    Some((palette, lookup))
}

/// Reduce `image` to at most `max_colors` palette entries (clamped to 2..=256).
pub fn quantize(image: &RgbaImage, max_colors: u16, dithering: f32) -> IndexedImage {
    let max = max_colors.clamp(2, 256) as usize;
    let (width, height) = image.dimensions();

    if let Some((palette, lookup)) = exact_palette(image, max) {
        let indices = image.pixels().map(|p| lookup[&p.0]).collect();
        return IndexedImage {
            width,
            height,
            palette,
            indices,
        };
    }

    let raw = image.as_raw();
    let sample = if raw.len() / 4 < FULL_SAMPLE_PIXELS {
        1
    } else {
        SAMPLE_FACTOR
    };
    let quant = NeuQuant::new(sample, max, raw);
    let palette: Vec<[u8; 4]> = quant
        .color_map_rgba()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();

    let level = dithering.clamp(0.0, 1.0);
    let indices = if level > 0.0 {
        diffuse(image, &quant, &palette, level)
    } else {
        image
            .pixels()
            .map(|p| quant.index_of(&p.0) as u8)
            .collect()
    };

    IndexedImage {
        width,
        height,
        palette,
        indices,
    }
}

/// Floyd–Steinberg mapping with the propagated error scaled by `level`.
fn diffuse(image: &RgbaImage, quant: &NeuQuant, palette: &[[u8; 4]], level: f32) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let w = width as usize;
    // One column of padding on each side so x-1 and x+1 never go out of range.
    let mut current = vec![[0f32; 4]; w + 2];
    let mut next = vec![[0f32; 4]; w + 2];
    let mut indices = Vec::with_capacity(w * height as usize);

    for y in 0..height {
        for x in 0..w {
            let px = image.get_pixel(x as u32, y).0;
            let mut value = [0f32; 4];
            for c in 0..4 {
                value[c] = (px[c] as f32 + current[x + 1][c]).clamp(0.0, 255.0);
            }
            let wanted = value.map(|v| v.round() as u8);
            let idx = quant.index_of(&wanted);
            indices.push(idx as u8);

            let chosen = palette[idx];
            for c in 0..4 {
                let err = (value[c] - chosen[c] as f32) * level;
                current[x + 2][c] += err * 7.0 / 16.0;
                next[x][c] += err * 3.0 / 16.0;
                next[x + 1][c] += err * 5.0 / 16.0;
                next[x + 2][c] += err / 16.0;
            }
        }
        std::mem::swap(&mut current, &mut next);
        next.fill([0.0; 4]);
    }

    indices
}
