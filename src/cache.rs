//! Result cache with LRU eviction
//!
//! Identical uploads analysed with the same OCR settings are served from
//! memory. Lookups are short, so a `parking_lot::Mutex` guards the LRU.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::extract::{Extraction, OcrMode};
use crate::ocr::OcrProvider;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    /// Hex sha256 of the uploaded bytes
    pub sha256: String,
    pub mode: OcrMode,
    pub engine: Option<OcrProvider>,
}

pub struct ResultCache {
    /// `None` when caching is disabled
    entries: Option<Mutex<LruCache<CacheKey, Arc<Extraction>>>>,
}

impl ResultCache {
    /// A cache holding up to `capacity` results; `0` disables it
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|n| Mutex::new(LruCache::new(n))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Extraction>> {
        self.entries.as_ref()?.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, extraction: Arc<Extraction>) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, extraction);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
