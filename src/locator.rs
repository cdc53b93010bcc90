//! Resolvable locators for encoded payloads.
//!
//! A display layer needs a reference it can hand to a renderer without
//! carrying the payload around. Two services are provided:
//!
//! - [`DataUriLocators`]: self-contained `data:<mime>;base64,...` strings.
//!   Nothing to release.
//! - [`BlobRegistry`]: short `blob:pixpress/<n>` keys into an in-memory map.
//!   Entries live until [`LocatorService::release`] is called.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const BLOB_PREFIX: &str = "blob:pixpress/";

/// Opaque reference to a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait LocatorService: Send + Sync {
    /// Derive a locator for `content` of the given MIME type.
    fn create(&self, content: &Bytes, mime: &str) -> Locator;

    /// Release whatever `create` reserved. Unknown locators are ignored.
    fn release(&self, locator: &Locator);
}

/// Inline `data:` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriLocators;

impl LocatorService for DataUriLocators {
    fn create(&self, content: &Bytes, mime: &str) -> Locator {
        Locator(format!("data:{mime};base64,{}", STANDARD.encode(content)))
    }

    fn release(&self, _locator: &Locator) {}
}

/// In-memory registry of `blob:` entries.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, (String, Bytes)>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The MIME type and payload behind a live locator.
    pub fn resolve(&self, locator: &Locator) -> Option<(String, Bytes)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(locator.as_str())
            .cloned()
    }

    /// Entries created and not yet released.
    pub fn live_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl LocatorService for BlobRegistry {
    fn create(&self, content: &Bytes, mime: &str) -> Locator {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = format!("{BLOB_PREFIX}{id}");
        // Bytes clones share the allocation
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), (mime.to_string(), content.clone()));
        debug!(locator = %key, size = content.len(), "registered blob");
        Locator(key)
    }

    fn release(&self, locator: &Locator) {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(locator.as_str());
        if removed.is_some() {
            debug!(%locator, "released blob");
        }
    }
}
