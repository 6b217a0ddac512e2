//! OCR Module
//!
//! Provides OCR (Optical Character Recognition) for scanned invoices.
//!
//! Supports multiple backends:
//! - Tesseract (local binary, `fra` language pack by default)
//! - Ollama vision models (local LLM, optional fallback)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use invoice_ocr_server::ocr::OcrService;
//!
//! let service = OcrService::new(&config.ocr);
//! let result = service.recognize(&png_bytes, None).await?;
//! println!("{} ({:.1}%)", result.text, result.confidence);
//! ```

mod provider;
mod service;
mod tsv;
mod types;

pub use provider::{OcrProviderTrait, OllamaProvider, TesseractOptions, TesseractProvider};
pub use service::OcrService;
pub use tsv::{parse_tsv, TsvPage};
pub use types::{OcrError, OcrProvider, OcrResult, OcrWord};

#[cfg(test)]
pub(crate) use provider::MockProvider;
