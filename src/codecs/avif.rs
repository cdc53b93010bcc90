//! AVIF via the rav1e-backed encoder in the `image` crate.

use crate::config::AvifConfig;
use crate::imaging::{ImagingError, Surface};
use image::codecs::avif::AvifEncoder;
use tracing::debug;

/// Encode a rendered surface with the configured quality and speed.
pub fn compress(surface: &Surface, config: &AvifConfig) -> Result<Vec<u8>, ImagingError> {
    let geometry = surface.geometry();
    if geometry.is_empty() {
        return Err(ImagingError::Encode(format!(
            "Cannot encode an empty {geometry} surface"
        )));
    }

    let speed = config.speed.clamp(1, 10);
    let quality = config.quality.clamp(1, 100);
    debug!(%geometry, speed, quality, "encoding AVIF");

    let mut buf = Vec::new();
    surface
        .pixels()
        .write_with_encoder(AvifEncoder::new_with_speed_quality(&mut buf, speed, quality))
        .map_err(|e| ImagingError::Encode(format!("AVIF encode failed: {e}")))?;
    Ok(buf)
}
