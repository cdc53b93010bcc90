//! Pure Rust raster backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify (JPEG, PNG, GIF, WebP) | `ImageReader::into_dimensions` (header only) |
//! | Identify (AVIF) | `avif-parse` container metadata |
//! | Identify / decode (SVG) | `resvg` / `usvg` |
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate decoders |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1) + BT.601 YUV→RGB |
//! | Draw | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode | `image` JPEG / PNG / WebP (lossless) / GIF / AVIF (rav1e, speed 6) encoders |

use super::backend::{
    Bitmap, HandleLedger, ImagingError, RasterBackend, Surface, check_surface_size,
};
use super::calculations::Geometry;
use super::params::{QualityHint, SourceFormat};
use super::svg;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::sync::LazyLock;
use tracing::debug;

/// AVIF encoder speed for the generic encode path.
const AVIF_SPEED: u8 = 6;

/// Raster formats handled by the `image` crate.
///
/// AVIF is deliberately absent: the `"avif"` feature only enables the rav1e
/// **encoder**, and `ImageFormat::reading_enabled()` wrongly reports `true`
/// for it. AVIF decoding goes through rav1d instead.
const RASTER_CANDIDATES: &[(SourceFormat, ImageFormat)] = &[
    (SourceFormat::Jpeg, ImageFormat::Jpeg),
    (SourceFormat::Png, ImageFormat::Png),
    (SourceFormat::Gif, ImageFormat::Gif),
    (SourceFormat::WebP, ImageFormat::WebP),
];

static SUPPORTED_FORMATS: LazyLock<Vec<SourceFormat>> = LazyLock::new(|| {
    let mut formats: Vec<SourceFormat> = RASTER_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(src, _)| *src)
        .collect();
    formats.push(SourceFormat::Avif);
    formats.push(SourceFormat::Svg);
    formats
});

/// Formats that have a working decoder compiled in.
pub fn supported_formats() -> &'static [SourceFormat] {
    &SUPPORTED_FORMATS
}

fn raster_format(format: SourceFormat) -> Option<ImageFormat> {
    RASTER_CANDIDATES
        .iter()
        .find(|(src, _)| *src == format)
        .map(|(_, fmt)| *fmt)
}

/// Pure Rust backend built on the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default)]
pub struct RustBackend {
    ledger: HandleLedger,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn reader(content: &[u8], format: SourceFormat) -> Result<ImageReader<Cursor<&[u8]>>, ImagingError> {
    let image_format = raster_format(format)
        .ok_or_else(|| ImagingError::Decode(format!("No raster decoder for {format}")))?;
    Ok(ImageReader::with_format(Cursor::new(content), image_format))
}

/// Extract dimensions from an AVIF container (no AV1 decode needed).
fn identify_avif(content: &[u8]) -> Result<Geometry, ImagingError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(content))
        .map_err(|e| ImagingError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| ImagingError::Decode(format!("Failed to read AVIF metadata: {e:?}")))?;
    Ok(Geometry::new(
        meta.max_frame_width.get(),
        meta.max_frame_height.get(),
    ))
}

/// Decode an AVIF payload using avif-parse (container) + rav1d (AV1 decode).
///
/// The decoder context is closed exactly once, after the inner decode
/// returns, whatever its outcome.
fn decode_avif(content: &[u8]) -> Result<DynamicImage, ImagingError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut Cursor::new(content))
        .map_err(|e| ImagingError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(ImagingError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let decoded = (|| -> Result<(u32, u32, Vec<u8>), ImagingError> {
        let mut data = Dav1dData::default();
        let buf_ptr = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
        if buf_ptr.is_null() {
            return Err(ImagingError::Decode("rav1d data_create failed".into()));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(ImagingError::Decode(format!("rav1d send_data failed ({})", rc.0)));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(ImagingError::Decode(format!("rav1d get_picture failed ({})", rc.0)));
        }

        let (w, h) = (pic.p.w as u32, pic.p.h as u32);
        let rgb = picture_to_rgb(&pic);
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        Ok((w, h, rgb?))
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };

    let (w, h, rgb) = decoded?;
    image::RgbImage::from_raw(w, h, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ImagingError::Decode("Decoded AVIF buffer size mismatch".into()))
}

/// Convert a decoded rav1d picture into interleaved RGB8.
fn picture_to_rgb(pic: &rav1d::include::dav1d::picture::Dav1dPicture) -> Result<Vec<u8>, ImagingError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| ImagingError::Decode(format!("AVIF picture is missing plane {i}")))
    };

    let y_ptr = plane(0)?;
    let layout = pic.p.layout;
    let mut planes = YuvPlanes {
        y_ptr,
        u_ptr: y_ptr,
        v_ptr: y_ptr,
        y_stride: pic.stride[0],
        uv_stride: 0,
        width: pic.p.w as u32,
        height: pic.p.h as u32,
        bpc: pic.p.bpc as u32,
        ss_x: false,
        ss_y: false,
        monochrome: layout == DAV1D_PIXEL_LAYOUT_I400,
    };

    if !planes.monochrome {
        (planes.ss_x, planes.ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                return Err(ImagingError::Decode(format!(
                    "Unsupported AVIF pixel layout: {layout}"
                )));
            }
        };
        planes.u_ptr = plane(1)?;
        planes.v_ptr = plane(2)?;
        planes.uv_stride = pic.stride[1];
    }

    Ok(planes.to_rgb())
}

/// Decoded YUV plane data from rav1d, ready for RGB conversion.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (e.g. I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Convert YUV planes to interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; (self.width * self.height * 3) as usize];

        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);

                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_sample(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    let cr = read_sample(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;

                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };

                let idx = ((row * self.width + col) * 3) as usize;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }

        rgb
    }
}

/// Read one sample from a plane; 10/12-bit content is stored as u16.
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}

fn encode_failed(format: SourceFormat) -> impl Fn(image::ImageError) -> ImagingError {
    move |e| ImagingError::Encode(format!("{format} encode failed: {e}"))
}

impl RasterBackend for RustBackend {
    fn identify(&self, content: &[u8], format: SourceFormat) -> Result<Geometry, ImagingError> {
        let _handle = self.ledger.acquire();
        let geometry = match format {
            SourceFormat::Avif => identify_avif(content)?,
            SourceFormat::Svg => svg::natural_geometry(&svg::parse_tree(content)?)?,
            _ => {
                let (width, height) = reader(content, format)?.into_dimensions().map_err(|e| {
                    ImagingError::Decode(format!("Failed to read {format} dimensions: {e}"))
                })?;
                Geometry::new(width, height)
            }
        };
        if geometry.is_empty() {
            return Err(ImagingError::Decode(format!(
                "{format} reports an empty {geometry} image"
            )));
        }
        Ok(geometry)
    }

    fn decode(&self, content: &[u8], format: SourceFormat) -> Result<Bitmap, ImagingError> {
        let guard = self.ledger.acquire();
        let image = match format {
            SourceFormat::Avif => decode_avif(content)?,
            SourceFormat::Svg => {
                let tree = svg::parse_tree(content)?;
                let natural = svg::natural_geometry(&tree)?;
                DynamicImage::ImageRgba8(svg::rasterize(&tree, natural)?)
            }
            _ => reader(content, format)?
                .decode()
                .map_err(|e| ImagingError::Decode(format!("Failed to decode {format}: {e}")))?,
        };
        debug!(%format, width = image.width(), height = image.height(), "decoded bitmap");
        Ok(Bitmap::new(image, guard))
    }

    fn draw(&self, bitmap: &Bitmap, target: Geometry) -> Result<Surface, ImagingError> {
        check_surface_size(target)?;
        let guard = self.ledger.acquire();
        let pixels = if target.is_empty() {
            RgbaImage::new(target.width, target.height)
        } else if bitmap.geometry() == target {
            bitmap.image().to_rgba8()
        } else {
            bitmap
                .image()
                .resize_exact(target.width, target.height, FilterType::Lanczos3)
                .into_rgba8()
        };
        Ok(Surface::new(pixels, guard))
    }

    fn encode(
        &self,
        surface: &Surface,
        format: SourceFormat,
        quality: QualityHint,
    ) -> Result<Vec<u8>, ImagingError> {
        let geometry = surface.geometry();
        if geometry.is_empty() {
            return Err(ImagingError::Encode(format!(
                "Cannot encode an empty {geometry} surface"
            )));
        }

        let pixels = surface.pixels();
        let mut buf = Cursor::new(Vec::new());
        match format {
            SourceFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.percent());
                DynamicImage::ImageRgba8(pixels.clone())
                    .to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(encode_failed(format))?;
            }
            SourceFormat::Png => {
                pixels
                    .write_with_encoder(PngEncoder::new(&mut buf))
                    .map_err(encode_failed(format))?;
            }
            SourceFormat::WebP => {
                // The image crate only ships a lossless WebP encoder; quality is ignored.
                pixels
                    .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
                    .map_err(encode_failed(format))?;
            }
            SourceFormat::Gif => {
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .encode(
                        pixels.as_raw(),
                        geometry.width,
                        geometry.height,
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(encode_failed(format))?;
            }
            SourceFormat::Avif => {
                let encoder =
                    AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality.percent());
                pixels
                    .write_with_encoder(encoder)
                    .map_err(encode_failed(format))?;
            }
            SourceFormat::Svg => {
                return Err(ImagingError::Encode(
                    "SVG output is produced by the vector codec, not a raster surface".into(),
                ));
            }
        }
        Ok(buf.into_inner())
    }

    fn open_handles(&self) -> usize {
        self.ledger.open()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageEncoder, RgbImage};

    /// Encode a small gradient JPEG in memory.
    pub(crate) fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    /// Encode a small AVIF through the rav1e encoder.
    pub(crate) fn test_avif(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut buf = Vec::new();
        img.write_with_encoder(AvifEncoder::new_with_speed_quality(&mut buf, 10, 80))
            .unwrap();
        buf
    }

    #[test]
    fn supported_formats_cover_the_pipeline() {
        let formats = supported_formats();
        for expected in [
            SourceFormat::Jpeg,
            SourceFormat::Png,
            SourceFormat::Gif,
            SourceFormat::WebP,
            SourceFormat::Avif,
            SourceFormat::Svg,
        ] {
            assert!(formats.contains(&expected), "expected {expected} to be supported");
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend.identify(&test_jpeg(200, 150), SourceFormat::Jpeg).unwrap();
        assert_eq!(dims, Geometry::new(200, 150));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn identify_garbage_is_decode_error() {
        let backend = RustBackend::new();
        let result = backend.identify(b"not an image", SourceFormat::Png);
        assert!(matches!(result, Err(ImagingError::Decode(_))));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn decode_draw_encode_jpeg() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_jpeg(64, 48), SourceFormat::Jpeg).unwrap();
        let surface = backend.draw(&bitmap, Geometry::new(32, 10)).unwrap();
        drop(bitmap);
        assert_eq!(surface.geometry(), Geometry::new(32, 10));

        let out = backend
            .encode(&surface, SourceFormat::Jpeg, QualityHint::default())
            .unwrap();
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
        assert_eq!(image::load_from_memory(&out).unwrap().width(), 32);

        drop(surface);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn encode_png_webp_gif_avif() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_jpeg(16, 16), SourceFormat::Jpeg).unwrap();
        let surface = backend.draw(&bitmap, Geometry::new(16, 16)).unwrap();

        let png = backend.encode(&surface, SourceFormat::Png, QualityHint::default()).unwrap();
        assert_eq!(&png[0..4], &[0x89, 0x50, 0x4E, 0x47]);
        let webp = backend.encode(&surface, SourceFormat::WebP, QualityHint::default()).unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        let gif = backend.encode(&surface, SourceFormat::Gif, QualityHint::default()).unwrap();
        assert_eq!(&gif[0..3], b"GIF");
        let avif = backend.encode(&surface, SourceFormat::Avif, QualityHint::default()).unwrap();
        assert!(!avif.is_empty());
    }

    #[test]
    fn encode_empty_surface_errors() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_jpeg(8, 8), SourceFormat::Jpeg).unwrap();
        let surface = backend.draw(&bitmap, Geometry::new(0, 8)).unwrap();
        let result = backend.encode(&surface, SourceFormat::Png, QualityHint::default());
        assert!(matches!(result, Err(ImagingError::Encode(_))));
    }

    #[test]
    fn oversized_draw_is_encode_error() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_jpeg(8, 8), SourceFormat::Jpeg).unwrap();
        let result = backend.draw(&bitmap, Geometry::new(1_000_000, 1_000_000));
        assert!(matches!(result, Err(ImagingError::Encode(_))));
        drop(bitmap);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn encode_svg_from_raster_errors() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_jpeg(8, 8), SourceFormat::Jpeg).unwrap();
        let surface = backend.draw(&bitmap, Geometry::new(8, 8)).unwrap();
        let result = backend.encode(&surface, SourceFormat::Svg, QualityHint::default());
        assert!(matches!(result, Err(ImagingError::Encode(_))));
    }

    #[test]
    fn decode_avif_roundtrip() {
        let backend = RustBackend::new();
        let bitmap = backend.decode(&test_avif(64, 48), SourceFormat::Avif).unwrap();
        assert_eq!(bitmap.geometry(), Geometry::new(64, 48));
    }

    #[test]
    fn identify_avif_dimensions() {
        let backend = RustBackend::new();
        let dims = backend.identify(&test_avif(120, 80), SourceFormat::Avif).unwrap();
        assert_eq!(dims, Geometry::new(120, 80));
    }

    #[test]
    fn svg_identify_and_decode() {
        let backend = RustBackend::new();
        let svg = crate::imaging::svg::tests::RED_SQUARE.as_bytes();
        assert_eq!(
            backend.identify(svg, SourceFormat::Svg).unwrap(),
            Geometry::new(40, 21)
        );
        let bitmap = backend.decode(svg, SourceFormat::Svg).unwrap();
        assert_eq!(bitmap.geometry(), Geometry::new(40, 21));
    }
}
