//! Application state management

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::ocr::OcrService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    ocr: OcrService,
    jobs: Semaphore,
    results: ResultCache,
}

impl AppState {
    /// Create the state with OCR providers built from the configuration
    pub fn new(config: Config) -> Self {
        let ocr = OcrService::new(&config.ocr);
        Self::with_ocr(config, ocr)
    }

    /// Create the state around an existing OCR service
    pub fn with_ocr(config: Config, ocr: OcrService) -> Self {
        let jobs = Semaphore::new(config.limits.max_concurrent_jobs.max(1));
        let results = ResultCache::new(config.limits.result_cache_size);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                ocr,
                jobs,
                results,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the OCR service
    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }

    /// Permits bounding concurrent extractions
    pub fn jobs(&self) -> &Semaphore {
        &self.inner.jobs
    }

    /// Get the result cache
    pub fn results(&self) -> &ResultCache {
        &self.inner.results
    }
}
