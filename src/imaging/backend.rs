//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait defines the operations every backend must
//! support: identify, decode, draw, and encode. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).
//!
//! ## Handle accounting
//!
//! Decoded bitmaps and drawing surfaces are scoped resources. Each one holds
//! a [`HandleGuard`] issued by the backend's [`HandleLedger`]; the guard
//! decrements the ledger when the owning value is dropped, on every exit
//! path. [`RasterBackend::open_handles`] exposes the count so tests can assert
//! that nothing leaks after a failed render or encode.

use super::calculations::Geometry;
use super::params::{QualityHint, SourceFormat};
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Background task interrupted: {0}")]
    Interrupted(String),
}

/// Largest surface, in pixels, any backend or codec will allocate.
///
/// 100 megapixels of RGBA is 400 MB.
pub const MAX_SURFACE_PIXELS: u64 = 100_000_000;

/// Reject a target too large to allocate.
pub fn check_surface_size(target: Geometry) -> Result<(), ImagingError> {
    if target.area() > MAX_SURFACE_PIXELS {
        return Err(ImagingError::Encode(format!(
            "{target} surface exceeds the {MAX_SURFACE_PIXELS} pixel limit"
        )));
    }
    Ok(())
}

impl From<tokio::task::JoinError> for ImagingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImagingError::Interrupted(err.to_string())
    }
}

/// Counter of open decode handles and surfaces.
///
/// Cloning shares the same counter.
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    open: Arc<AtomicUsize>,
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> HandleGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        HandleGuard {
            open: Arc::clone(&self.open),
        }
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Releases one ledger slot on drop.
#[derive(Debug)]
pub struct HandleGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A transient decoded bitmap at the source's natural size.
#[derive(Debug)]
pub struct Bitmap {
    image: DynamicImage,
    _guard: HandleGuard,
}

impl Bitmap {
    pub fn new(image: DynamicImage, guard: HandleGuard) -> Self {
        Self {
            image,
            _guard: guard,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.image.width(), self.image.height())
    }
}

/// A drawing surface holding rendered RGBA pixels.
///
/// Dropping the surface releases it.
#[derive(Debug)]
pub struct Surface {
    pixels: RgbaImage,
    _guard: HandleGuard,
}

impl Surface {
    pub fn new(pixels: RgbaImage, guard: HandleGuard) -> Self {
        Self {
            pixels,
            _guard: guard,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.pixels.width(), self.pixels.height())
    }
}

/// Trait for raster backends.
///
/// Backends are shared across blocking tasks, hence `Send + Sync + 'static`.
pub trait RasterBackend: Send + Sync + 'static {
    /// Read natural dimensions. Any handle opened here is closed before returning.
    fn identify(&self, content: &[u8], format: SourceFormat) -> Result<Geometry, ImagingError>;

    /// Decode the payload into a bitmap at its natural size.
    fn decode(&self, content: &[u8], format: SourceFormat) -> Result<Bitmap, ImagingError>;

    /// Stretch `bitmap` over a new surface of exactly `target` pixels.
    fn draw(&self, bitmap: &Bitmap, target: Geometry) -> Result<Surface, ImagingError>;

    /// Encode surface pixels as `format`.
    fn encode(
        &self,
        surface: &Surface,
        format: SourceFormat,
        quality: QualityHint,
    ) -> Result<Vec<u8>, ImagingError>;

    /// Number of bitmaps and surfaces currently alive.
    fn open_handles(&self) -> usize;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations and fakes the pixel work.
    ///
    /// Bitmaps and surfaces still go through a real [`HandleLedger`], so
    /// resource accounting is exercised exactly as in production.
    #[derive(Default)]
    pub struct MockBackend {
        pub natural: Mutex<Option<Geometry>>,
        pub encoded: Mutex<Vec<u8>>,
        pub fail_decode: bool,
        pub fail_draw: bool,
        pub fail_encode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
        pub ledger: HandleLedger,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(SourceFormat),
        Decode(SourceFormat),
        Draw { width: u32, height: u32 },
        Encode { format: SourceFormat, quality: u8 },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Backend whose decodes report `natural` and whose encodes return `encoded`.
        pub fn with_output(natural: Geometry, encoded: Vec<u8>) -> Self {
            Self {
                natural: Mutex::new(Some(natural)),
                encoded: Mutex::new(encoded),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn natural(&self) -> Result<Geometry, ImagingError> {
            self.natural
                .lock()
                .unwrap()
                .ok_or_else(|| ImagingError::Decode("No mock dimensions".to_string()))
        }
    }

    impl RasterBackend for MockBackend {
        fn identify(&self, _content: &[u8], format: SourceFormat) -> Result<Geometry, ImagingError> {
            self.record(RecordedOp::Identify(format));
            let _handle = self.ledger.acquire();
            if self.fail_decode {
                return Err(ImagingError::Decode("mock decode failure".into()));
            }
            self.natural()
        }

        fn decode(&self, _content: &[u8], format: SourceFormat) -> Result<Bitmap, ImagingError> {
            self.record(RecordedOp::Decode(format));
            if self.fail_decode {
                return Err(ImagingError::Decode("mock decode failure".into()));
            }
            let natural = self.natural()?;
            Ok(Bitmap::new(
                DynamicImage::new_rgba8(natural.width, natural.height),
                self.ledger.acquire(),
            ))
        }

        fn draw(&self, _bitmap: &Bitmap, target: Geometry) -> Result<Surface, ImagingError> {
            self.record(RecordedOp::Draw {
                width: target.width,
                height: target.height,
            });
            if self.fail_draw {
                return Err(ImagingError::Encode("mock draw failure".into()));
            }
            Ok(Surface::new(
                RgbaImage::new(target.width, target.height),
                self.ledger.acquire(),
            ))
        }

        fn encode(
            &self,
            _surface: &Surface,
            format: SourceFormat,
            quality: QualityHint,
        ) -> Result<Vec<u8>, ImagingError> {
            self.record(RecordedOp::Encode {
                format,
                quality: quality.percent(),
            });
            if self.fail_encode {
                return Err(ImagingError::Encode("mock encode failure".into()));
            }
            Ok(self.encoded.lock().unwrap().clone())
        }

        fn open_handles(&self) -> usize {
            self.ledger.open()
        }
    }

    #[test]
    fn ledger_counts_guards_until_dropped() {
        let ledger = HandleLedger::new();
        let a = ledger.acquire();
        let b = ledger.clone().acquire();
        assert_eq!(ledger.open(), 2);
        drop(a);
        assert_eq!(ledger.open(), 1);
        drop(b);
        assert_eq!(ledger.open(), 0);
    }

    #[test]
    fn surface_releases_its_handle_on_drop() {
        let ledger = HandleLedger::new();
        let surface = Surface::new(RgbaImage::new(4, 3), ledger.acquire());
        assert_eq!(surface.geometry(), Geometry::new(4, 3));
        assert_eq!(ledger.open(), 1);
        drop(surface);
        assert_eq!(ledger.open(), 0);
    }

    #[test]
    fn mock_records_decode_and_draw() {
        let backend = MockBackend::with_output(Geometry::new(800, 600), vec![1, 2, 3]);

        let bitmap = backend.decode(b"x", SourceFormat::Png).unwrap();
        assert_eq!(bitmap.geometry(), Geometry::new(800, 600));
        let surface = backend.draw(&bitmap, Geometry::new(80, 60)).unwrap();
        assert_eq!(backend.open_handles(), 2);
        drop(bitmap);
        drop(surface);
        assert_eq!(backend.open_handles(), 0);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Decode(SourceFormat::Png)));
        assert!(matches!(
            &ops[1],
            RecordedOp::Draw {
                width: 80,
                height: 60
            }
        ));
    }

    #[test]
    fn mock_identify_closes_its_handle_on_failure() {
        let backend = MockBackend {
            fail_decode: true,
            ..MockBackend::new()
        };
        assert!(backend.identify(b"x", SourceFormat::Jpeg).is_err());
        assert_eq!(backend.open_handles(), 0);
    }
}
