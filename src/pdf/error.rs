//! Document error types

use thiserror::Error;

/// PDF loading and rendering errors
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Page not found
    #[error("Page not found: index {0}")]
    PageNotFound(usize),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to render content
    #[error("Render error: {0}")]
    RenderError(String),

    /// Invalid content (wrong magic bytes, encrypted, empty)
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// MuPDF context error
    #[error("MuPDF error: {0}")]
    ContextError(String),

    /// Image processing error
    #[error("Image error: {0}")]
    ImageError(String),

    /// Blocking task failed to join
    #[error("Task join error: {0}")]
    Join(String),
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ContextError(err.to_string())
    }
}
