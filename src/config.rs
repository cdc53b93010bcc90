//! Compression options.
//!
//! Handles loading, validating, and layering `CompressionOptions`. Options
//! resolve in three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  --config file.toml  →  CLI flags (--width, --method, ...)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! max_preview_size = 256    # Longest preview side in pixels
//!
//! [resize]
//! method = "unchanged"      # unchanged | toWidth | toHeight
//! # width = 1200            # Target width (pixels, may be fractional)
//! # height = 800            # Target height (pixels, may be fractional)
//!
//! [jpeg]
//! quality = 0.75            # 0.0 - 1.0
//!
//! [png]
//! colors = 128              # Palette size, 2 - 256
//! dithering = 1.0           # 0.0 (off) - 1.0 (full Floyd–Steinberg)
//!
//! [gif]
//! colors = 128              # Palette size per frame, 2 - 256
//! dithering = false
//!
//! [avif]
//! quality = 50              # 1 - 100
//! speed = 8                 # 1 (slowest, smallest) - 10 (fastest)
//!
//! [svg]
//! precision = 3             # Decimal digits for coordinates and transforms
//! ```
//!
//! Only the section matching the input's format is consulted. Unknown keys
//! are rejected to catch typos early.

use crate::imaging::ResizeMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Options for one compression request.
///
/// All fields have defaults; config files only specify what they override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionOptions {
    /// Longest side of preview renditions, in pixels.
    pub max_preview_size: u32,
    /// Output size.
    pub resize: ResizeConfig,
    /// JPEG and generic raster settings.
    pub jpeg: JpegConfig,
    pub png: PngConfig,
    pub gif: GifConfig,
    pub avif: AvifConfig,
    pub svg: SvgConfig,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_preview_size: 256,
            resize: ResizeConfig::default(),
            jpeg: JpegConfig::default(),
            png: PngConfig::default(),
            gif: GifConfig::default(),
            avif: AvifConfig::default(),
            svg: SvgConfig::default(),
        }
    }
}

fn check(ok: bool, message: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn positive_target(value: Option<f64>) -> bool {
    value.is_none_or(|v| v.is_finite() && v > 0.0)
}

impl CompressionOptions {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.max_preview_size > 0, "max_preview_size must be positive")?;
        check(
            positive_target(self.resize.width),
            "resize.width must be a positive number",
        )?;
        check(
            positive_target(self.resize.height),
            "resize.height must be a positive number",
        )?;
        check(
            (0.0..=1.0).contains(&self.jpeg.quality),
            "jpeg.quality must be 0.0-1.0",
        )?;
        check(
            (2..=256).contains(&self.png.colors),
            "png.colors must be 2-256",
        )?;
        check(
            (0.0..=1.0).contains(&self.png.dithering),
            "png.dithering must be 0.0-1.0",
        )?;
        check(
            (2..=256).contains(&self.gif.colors),
            "gif.colors must be 2-256",
        )?;
        check(
            (1..=100).contains(&self.avif.quality),
            "avif.quality must be 1-100",
        )?;
        check((1..=10).contains(&self.avif.speed), "avif.speed must be 1-10")?;
        check(self.svg.precision <= 8, "svg.precision must be 0-8")?;
        Ok(())
    }
}

/// Output size settings. See [`calculate_output_geometry`](crate::imaging::calculate_output_geometry).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub method: ResizeMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegConfig {
    /// Encoder quality, 0.0 (worst) to 1.0 (best).
    pub quality: f64,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self { quality: 0.75 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngConfig {
    /// Maximum palette entries.
    pub colors: u16,
    /// Error-diffusion strength, 0.0 to 1.0.
    pub dithering: f32,
}

impl Default for PngConfig {
    fn default() -> Self {
        Self {
            colors: 128,
            dithering: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GifConfig {
    /// Maximum palette entries per frame.
    pub colors: u16,
    pub dithering: bool,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            colors: 128,
            dithering: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifConfig {
    pub quality: u8,
    pub speed: u8,
}

impl Default for AvifConfig {
    fn default() -> Self {
        Self {
            quality: 50,
            speed: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvgConfig {
    /// Decimal digits kept for coordinates and transforms.
    pub precision: u8,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self { precision: 3 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock defaults as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CompressionOptions::default()).expect("default options must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a TOML options file as a raw value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays in order onto `base`, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<CompressionOptions, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let options: CompressionOptions = merged.try_into()?;
    options.validate()?;
    Ok(options)
}

/// Load options from a TOML file, layered over the stock defaults.
pub fn load_config(path: &Path) -> Result<CompressionOptions, ConfigError> {
    resolve_config(stock_defaults_value(), [load_raw_config(path)?])
}

/// Returns a fully-commented stock options file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixpress options
# ================
# Every key is optional; omitted keys keep the defaults shown here.
# Only the section matching the input's format is used.

# Longest side of preview renditions, in pixels. Previews never upscale.
max_preview_size = 256

[resize]
# unchanged: keep the natural size.
# toWidth / toHeight: scale by the given side, keeping the aspect ratio.
# Setting both width and height forces that exact size (may distort).
method = "unchanged"
# width = 1200
# height = 800

[jpeg]
# Quality for JPEG and other generic raster output, 0.0 - 1.0.
quality = 0.75

[png]
# Palette size, 2 - 256. Fewer colors = smaller files.
colors = 128
# Error-diffusion dithering strength, 0.0 (off) - 1.0 (full).
dithering = 1.0

[gif]
# Palette size per frame, 2 - 256. Animation is preserved.
colors = 128
dithering = false

[avif]
# Quality 1 - 100.
quality = 50
# Encoder speed 1 (slowest, smallest) - 10 (fastest).
speed = 8

[svg]
# Decimal digits kept for coordinates and transforms.
precision = 3
"##
}
