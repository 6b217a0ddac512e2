//! OCR Types

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract OCR (local binary)
    #[default]
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl OcrProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tesseract => "tesseract",
            Self::Ollama => "ollama",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Some(Self::Tesseract),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// OCR result
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Provider used
    pub provider: OcrProvider,
    /// Word-level results, when the provider reports them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<OcrWord>>,
}

/// Single recognized word with its pixel box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f64,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("OCR timed out after {0} seconds")]
    Timeout(u64),

    #[error("API error: {0}")]
    ApiError(String),
}
