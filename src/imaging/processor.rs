//! Per-image processing core.
//!
//! An [`ImageProcessor`] pairs one [`ImageRecord`] with one set of
//! [`CompressionOptions`]. Geometry is pure math on the two; rendering and
//! encoding run on tokio's blocking pool so callers never stall an async
//! worker while pixels are being pushed around.
//!
//! ```text
//! output_geometry / preview_geometry   (pure)
//!        │
//!        ▼
//! render(target) ──► Surface ──► encode(surface, hint) ──► Bytes
//!   decode + draw                  consumes the surface
//! ```
//!
//! The processor never retries and never falls back on its own. Callers
//! decide when to use [`ImageProcessor::fallback`]; see
//! [`compress`](crate::compress).

use super::backend::{ImagingError, RasterBackend, Surface};
use super::calculations::{Geometry, calculate_output_geometry, calculate_preview_geometry};
use super::params::{QualityHint, SourceFormat};
use crate::config::CompressionOptions;
use crate::locator::LocatorService;
use crate::types::{ImageRecord, ProcessResult};
use bytes::Bytes;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::debug;

pub struct ImageProcessor<B: RasterBackend> {
    record: ImageRecord,
    options: CompressionOptions,
    backend: Arc<B>,
    locators: Arc<dyn LocatorService>,
}

impl<B: RasterBackend> ImageProcessor<B> {
    pub fn new(
        record: ImageRecord,
        options: CompressionOptions,
        backend: Arc<B>,
        locators: Arc<dyn LocatorService>,
    ) -> Self {
        Self {
            record,
            options,
            backend,
            locators,
        }
    }

    pub fn record(&self) -> &ImageRecord {
        &self.record
    }

    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn locators(&self) -> &Arc<dyn LocatorService> {
        &self.locators
    }

    /// Natural dimensions of `content`.
    ///
    /// Whatever the backend opens to read them is closed before this returns.
    pub async fn measure(
        backend: Arc<B>,
        content: Bytes,
        format: SourceFormat,
    ) -> Result<Geometry, ImagingError> {
        spawn_blocking(move || backend.identify(&content, format)).await?
    }

    /// Target size for compressed output. See [`calculate_output_geometry`].
    pub fn output_geometry(&self) -> Geometry {
        let resize = &self.options.resize;
        calculate_output_geometry(self.record.natural(), resize.method, resize.width, resize.height)
    }

    /// Target size for the preview rendition. See [`calculate_preview_geometry`].
    pub fn preview_geometry(&self) -> Geometry {
        calculate_preview_geometry(self.record.natural(), self.options.max_preview_size)
    }

    /// Decode the original and stretch it over a `target`-sized surface.
    ///
    /// The intermediate bitmap is dropped before this returns, on success
    /// and on failure alike.
    pub async fn render(&self, target: Geometry) -> Result<Surface, ImagingError> {
        let backend = Arc::clone(&self.backend);
        let content = self.record.content.clone();
        let format = self.record.format;
        debug!(key = %self.record.key, %target, "rendering");

        spawn_blocking(move || {
            let bitmap = backend.decode(&content, format)?;
            backend.draw(&bitmap, target)
        })
        .await?
    }

    /// Encode `surface` in the record's format, consuming it.
    ///
    /// `quality` falls back to [`QualityHint::DEFAULT`] and only matters to
    /// lossy encoders. SVG sources are written as PNG.
    pub async fn encode(
        &self,
        surface: Surface,
        quality: Option<QualityHint>,
    ) -> Result<Bytes, ImagingError> {
        let backend = Arc::clone(&self.backend);
        let format = self.record.format.surface_format();
        let quality = quality.unwrap_or_default();

        let encoded = spawn_blocking(move || backend.encode(&surface, format, quality)).await??;
        debug!(key = %self.record.key, %format, size = encoded.len(), "encoded");
        Ok(Bytes::from(encoded))
    }

    /// Downscaled rendition at the default quality hint.
    pub async fn preview(&self) -> Result<ProcessResult, ImagingError> {
        let target = self.preview_geometry();
        let surface = self.render(target).await?;
        let content = self.encode(surface, None).await?;
        Ok(self.result(target, content, self.record.format.surface_format()))
    }

    /// The original content at natural size, with a fresh locator.
    pub fn fallback(&self) -> ProcessResult {
        self.result(
            self.record.natural(),
            self.record.content.clone(),
            self.record.format,
        )
    }

    /// Wrap `content` produced for this record.
    pub fn result(&self, geometry: Geometry, content: Bytes, format: SourceFormat) -> ProcessResult {
        let preview_uri = self.locators.create(&content, format.mime());
        ProcessResult {
            width: geometry.width,
            height: geometry.height,
            content,
            preview_uri,
        }
    }
}
