//! Upload checks: file names, extensions and content sniffing

use std::path::Path;

use axum::body::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::pdf::is_pdf;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

const FALLBACK_FILENAME: &str = "upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Kind implied by the file extension, `UnsupportedType` (carrying the
    /// dotted suffix, empty when there is none) otherwise
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some(e) if ALLOWED_EXTENSIONS.contains(&e) => Ok(DocumentKind::Image),
            Some(e) => Err(AppError::UnsupportedType(format!(".{}", e))),
            None => Err(AppError::UnsupportedType(String::new())),
        }
    }

    /// Check that the bytes are what the extension claims
    pub fn check_content(&self, bytes: &[u8]) -> Result<()> {
        match self {
            DocumentKind::Pdf if is_pdf(bytes) => Ok(()),
            DocumentKind::Pdf => Err(AppError::InvalidDocument(
                "file does not start with %PDF".to_string(),
            )),
            DocumentKind::Image => image::load_from_memory(bytes)
                .map(|_| ())
                .map_err(|e| AppError::InvalidDocument(format!("unreadable image: {}", e))),
        }
    }

    /// [`check_content`](Self::check_content) on a blocking thread, since
    /// images are fully decoded
    pub async fn check_content_blocking(self, bytes: Bytes) -> Result<()> {
        tokio::task::spawn_blocking(move || self.check_content(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("content check failed: {}", e)))?
    }
}

/// ASCII-only file name safe to echo back or log
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\scans\\Facture mars.PDF"), "Facture_mars.PDF");
        assert_eq!(secure_filename("été 2024.pdf"), "t_2024.pdf");
        assert_eq!(secure_filename(".hidden.png"), "hidden.png");
        assert_eq!(secure_filename("///"), "upload");
        assert_eq!(secure_filename("€€€"), "upload");
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_filename("a.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("scan.jpeg").unwrap(), DocumentKind::Image);
        let err = DocumentKind::from_filename("notes.docx").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported extension: .docx");
        match DocumentKind::from_filename("README") {
            Err(AppError::UnsupportedType(ext)) => assert!(ext.is_empty()),
            other => panic!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_content_checks() {
        assert!(DocumentKind::Pdf.check_content(b"%PDF-1.7\n").is_ok());
        assert!(matches!(
            DocumentKind::Pdf.check_content(b"\x89PNG"),
            Err(AppError::InvalidDocument(_))
        ));
        assert!(DocumentKind::Image.check_content(b"not an image").is_err());

        let mut png = Vec::new();
        image::RgbImage::new(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert!(DocumentKind::Image.check_content(&png).is_ok());
    }

    #[tokio::test]
    async fn test_content_check_off_the_runtime() {
        let mut png = Vec::new();
        image::RgbImage::new(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert!(DocumentKind::Image
            .check_content_blocking(Bytes::from(png))
            .await
            .is_ok());
        assert!(matches!(
            DocumentKind::Image
                .check_content_blocking(Bytes::from_static(b"\x89PNG truncated"))
                .await,
            Err(AppError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
