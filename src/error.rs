//! Error types for the invoice OCR server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::OcrError;
use crate::pdf::DocumentError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Unsupported extension: {0}")]
    UnsupportedType(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Extraction timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::InvalidDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OcrUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::UnsupportedType(_) => "unsupported_type",
            AppError::InvalidDocument(_) => "invalid_document",
            AppError::OcrUnavailable(_) => "ocr_unavailable",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::InvalidContent(msg) | DocumentError::ParseError(msg) => {
                AppError::InvalidDocument(msg)
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<OcrError> for AppError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::ProviderNotAvailable(msg) => AppError::OcrUnavailable(msg),
            OcrError::InvalidImage(msg) => AppError::InvalidDocument(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Error response envelope: `{"ok": false, "error": {"code", "message"}}`
#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        let body = Json(ErrorResponse {
            ok: false,
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::UnsupportedType(".gif".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(AppError::Timeout(120).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::InvalidDocument("bad".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = AppError::UnsupportedType(".gif".into());
        assert_eq!(err.code(), "unsupported_type");
        assert_eq!(err.to_string(), "Unsupported extension: .gif");
    }

    #[test]
    fn test_ocr_error_conversion() {
        let err: AppError = OcrError::ProviderNotAvailable("tesseract".into()).into();
        assert!(matches!(err, AppError::OcrUnavailable(_)));
    }
}
