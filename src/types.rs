//! Records passed between the loader, the processor, and its callers.
//!
//! Both types are immutable once built. Each owns a locator from a
//! [`LocatorService`]; call `discard` with the same service when done so
//! registry-backed locators are released.

use crate::imaging::{Geometry, ImageProcessor, ImagingError, RasterBackend, SourceFormat};
use crate::locator::{Locator, LocatorService};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// One loaded image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    /// Caller-assigned identifier, stable for the record's lifetime.
    pub key: String,
    /// Original filename, for display only.
    pub name: String,
    /// Natural width, measured at load time.
    pub width: u32,
    /// Natural height, measured at load time.
    pub height: u32,
    pub format: SourceFormat,
    /// Original encoded payload.
    #[serde(skip)]
    pub content: Bytes,
    /// Locator for `content`.
    pub preview_uri: Locator,
}

impl ImageRecord {
    /// Detect the format, measure natural dimensions, and derive a locator.
    ///
    /// `declared_mime` wins over content sniffing when it names a known type.
    pub async fn load<B: RasterBackend>(
        key: impl Into<String>,
        name: impl Into<String>,
        declared_mime: Option<&str>,
        content: Bytes,
        backend: &Arc<B>,
        locators: &dyn LocatorService,
    ) -> Result<Self, ImagingError> {
        let name = name.into();
        let format = SourceFormat::detect(declared_mime, &content)
            .ok_or_else(|| ImagingError::Decode(format!("{name}: unrecognized image format")))?;
        let natural = ImageProcessor::measure(Arc::clone(backend), content.clone(), format).await?;
        debug!(%name, %format, %natural, "loaded image");

        let preview_uri = locators.create(&content, format.mime());
        Ok(Self {
            key: key.into(),
            name,
            width: natural.width,
            height: natural.height,
            format,
            content,
            preview_uri,
        })
    }

    pub fn natural(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn discard(self, locators: &dyn LocatorService) {
        locators.release(&self.preview_uri);
    }
}

/// The outcome of one processing operation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub content: Bytes,
    pub preview_uri: Locator,
}

impl ProcessResult {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    pub fn discard(self, locators: &dyn LocatorService) {
        locators.release(&self.preview_uri);
    }
}
