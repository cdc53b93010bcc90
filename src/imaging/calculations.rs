//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Fractional results are always rounded **up** and clamped to at least one
//! pixel, so a positive source and positive targets can never produce a
//! zero-sized output.

use serde::{Deserialize, Serialize};

/// A `{width, height}` pair in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the longer side.
    pub fn longer_side(self) -> u32 {
        self.width.max(self.height)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel count, widened so huge targets cannot overflow.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the output size is derived from the natural size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeMethod {
    #[default]
    #[serde(rename = "unchanged")]
    Unchanged,
    #[serde(rename = "toWidth", alias = "to_width")]
    ToWidth,
    #[serde(rename = "toHeight", alias = "to_height")]
    ToHeight,
}

/// Round a computed dimension up to a whole pixel, never below one.
fn ceil_px(value: f64) -> u32 {
    if value.is_nan() || value <= 1.0 {
        return 1;
    }
    if value >= u32::MAX as f64 {
        return u32::MAX;
    }
    value.ceil() as u32
}

/// Scale `target` by `num / den`, multiplying first so integer ratios stay exact.
fn scale_ceil(target: f64, num: u32, den: u32) -> u32 {
    ceil_px(target * num as f64 / den.max(1) as f64)
}

/// Calculate the output geometry for a resize request.
///
/// | method | width | height | result |
/// |---|---|---|---|
/// | `Unchanged`, or neither target | — | — | natural size |
/// | other | `None` | `Some(h)` | height-driven, aspect preserved |
/// | other | `Some(w)` | `None` | width-driven, aspect preserved |
/// | other | `Some(w)` | `Some(h)` | exactly `w x h` (may distort) |
///
/// # Examples
/// ```
/// # use pixpress::imaging::{Geometry, ResizeMethod, calculate_output_geometry};
/// let natural = Geometry::new(400, 300);
/// let out = calculate_output_geometry(natural, ResizeMethod::ToWidth, Some(200.0), None);
/// assert_eq!(out, Geometry::new(200, 150));
/// ```
pub fn calculate_output_geometry(
    natural: Geometry,
    method: ResizeMethod,
    width: Option<f64>,
    height: Option<f64>,
) -> Geometry {
    if method == ResizeMethod::Unchanged {
        return natural;
    }

    match (width, height) {
        (None, None) => natural,
        (None, Some(h)) => Geometry {
            width: scale_ceil(h, natural.width, natural.height),
            height: ceil_px(h),
        },
        (Some(w), None) => Geometry {
            width: ceil_px(w),
            height: scale_ceil(w, natural.height, natural.width),
        },
        (Some(w), Some(h)) => Geometry {
            width: ceil_px(w),
            height: ceil_px(h),
        },
    }
}

/// Calculate a preview geometry whose longer side is at most `max_size`.
///
/// Never upscales. When width and height are equal the width governs, which
/// for a square makes no visible difference but keeps the choice deterministic.
pub fn calculate_preview_geometry(natural: Geometry, max_size: u32) -> Geometry {
    if natural.longer_side() <= max_size {
        return natural;
    }

    let max = max_size as f64;
    if natural.width >= natural.height {
        Geometry {
            width: ceil_px(max),
            height: scale_ceil(max, natural.height, natural.width),
        }
    } else {
        Geometry {
            width: scale_ceil(max, natural.width, natural.height),
            height: ceil_px(max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_output_geometry tests
    // =========================================================================

    #[test]
    fn unchanged_keeps_natural_geometry() {
        for (w, h) in [(1, 1), (400, 300), (3000, 17), (17, 3000)] {
            let natural = Geometry::new(w, h);
            assert_eq!(
                calculate_output_geometry(natural, ResizeMethod::Unchanged, Some(10.0), Some(20.0)),
                natural
            );
        }
    }

    #[test]
    fn absent_targets_behave_like_unchanged() {
        let natural = Geometry::new(640, 480);
        for method in [ResizeMethod::ToWidth, ResizeMethod::ToHeight] {
            assert_eq!(calculate_output_geometry(natural, method, None, None), natural);
        }
    }

    #[test]
    fn to_width_preserves_aspect() {
        let out = calculate_output_geometry(
            Geometry::new(400, 300),
            ResizeMethod::ToWidth,
            Some(200.0),
            None,
        );
        assert_eq!(out, Geometry::new(200, 150));
    }

    #[test]
    fn to_height_preserves_aspect() {
        let out = calculate_output_geometry(
            Geometry::new(400, 300),
            ResizeMethod::ToHeight,
            None,
            Some(150.0),
        );
        assert_eq!(out, Geometry::new(200, 150));
    }

    #[test]
    fn presence_of_targets_decides_the_mode() {
        // Declared method says width, only height is set: height drives.
        let out = calculate_output_geometry(
            Geometry::new(400, 300),
            ResizeMethod::ToWidth,
            None,
            Some(150.0),
        );
        assert_eq!(out, Geometry::new(200, 150));
    }

    #[test]
    fn both_targets_allow_distortion() {
        for natural in [Geometry::new(400, 300), Geometry::new(90, 1600)] {
            let out =
                calculate_output_geometry(natural, ResizeMethod::ToWidth, Some(500.0), Some(500.0));
            assert_eq!(out, Geometry::new(500, 500));
        }
    }

    #[test]
    fn fractional_results_round_up() {
        // 100 * 333 / 1000 = 33.3 → 34
        let out = calculate_output_geometry(
            Geometry::new(1000, 333),
            ResizeMethod::ToWidth,
            Some(100.0),
            None,
        );
        assert_eq!(out, Geometry::new(100, 34));

        let out = calculate_output_geometry(
            Geometry::new(400, 300),
            ResizeMethod::ToWidth,
            Some(199.2),
            Some(10.01),
        );
        assert_eq!(out, Geometry::new(200, 11));
    }

    #[test]
    fn extreme_aspect_never_reaches_zero() {
        // 10 * 1 / 5000 = 0.002 → 1
        let out = calculate_output_geometry(
            Geometry::new(5000, 1),
            ResizeMethod::ToWidth,
            Some(10.0),
            None,
        );
        assert_eq!(out, Geometry::new(10, 1));
    }

    // =========================================================================
    // calculate_preview_geometry tests
    // =========================================================================

    #[test]
    fn preview_scales_landscape_to_bound() {
        assert_eq!(
            calculate_preview_geometry(Geometry::new(3000, 1000), 600),
            Geometry::new(600, 200)
        );
    }

    #[test]
    fn preview_scales_portrait_to_bound() {
        assert_eq!(
            calculate_preview_geometry(Geometry::new(1000, 3000), 600),
            Geometry::new(200, 600)
        );
    }

    #[test]
    fn preview_never_upscales() {
        assert_eq!(
            calculate_preview_geometry(Geometry::new(500, 500), 1000),
            Geometry::new(500, 500)
        );
        // Exactly at the bound is left alone too
        assert_eq!(
            calculate_preview_geometry(Geometry::new(600, 200), 600),
            Geometry::new(600, 200)
        );
    }

    #[test]
    fn preview_square_uses_width_as_longer_side() {
        assert_eq!(
            calculate_preview_geometry(Geometry::new(2000, 2000), 300),
            Geometry::new(300, 300)
        );
    }

    #[test]
    fn preview_rounds_up() {
        // 256 * 999 / 1000 = 255.744 → 256
        assert_eq!(
            calculate_preview_geometry(Geometry::new(1000, 999), 256),
            Geometry::new(256, 256)
        );
        // 256 * 1 / 4000 = 0.064 → 1
        assert_eq!(
            calculate_preview_geometry(Geometry::new(4000, 1), 256),
            Geometry::new(256, 1)
        );
    }

    #[test]
    fn preview_is_idempotent() {
        let natural = Geometry::new(4032, 3024);
        let first = calculate_preview_geometry(natural, 512);
        assert_eq!(first, calculate_preview_geometry(natural, 512));
        assert_eq!(first, Geometry::new(512, 384));
    }

    #[test]
    fn area_does_not_overflow() {
        assert_eq!(Geometry::new(1_000_000, 1_000_000).area(), 1_000_000_000_000);
        assert_eq!(Geometry::new(0, 5).area(), 0);
    }

    #[test]
    fn resize_method_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            method: ResizeMethod,
        }
        let parse = |s: &str| toml::from_str::<Wrapper>(&format!("method = \"{s}\"")).unwrap().method;
        assert_eq!(parse("unchanged"), ResizeMethod::Unchanged);
        assert_eq!(parse("toWidth"), ResizeMethod::ToWidth);
        assert_eq!(parse("to_height"), ResizeMethod::ToHeight);
    }
}
