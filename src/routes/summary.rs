//! Invoice summary endpoint
//!
//! Endpoints:
//! - POST /summary - Analyse an uploaded PDF or image (multipart `file` field)
//! - POST /api/v1/summary - Same, versioned path
//!
//! Query parameters:
//! - `ocr`: `auto` (default), `always` or `never`
//! - `engine`: pin the OCR engine (`tesseract`, `ollama`)
//! - `preview`: include the first 2000 characters of the analysed text

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Query, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::error::{AppError, Result};
use crate::extract::{
    extract_document, ExtractOptions, Extraction, ExtractionMeta, Field, FieldValue, FlatSummary,
    InvoiceLine, OcrMode,
};
use crate::ocr::OcrProvider;
use crate::state::AppState;
use crate::upload::{secure_filename, sha256_hex, DocumentKind};

const PREVIEW_CHARS: usize = 2000;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub ocr: Option<String>,
    pub engine: Option<String>,
    pub preview: Option<String>,
}

/// Validated query parameters
#[derive(Debug, Clone, Copy, PartialEq)]
struct SummaryParams {
    mode: OcrMode,
    engine: Option<OcrProvider>,
    preview: bool,
}

impl SummaryQuery {
    fn validate(&self) -> Result<SummaryParams> {
        let mode = match self.ocr.as_deref() {
            None => OcrMode::Auto,
            Some(v) => OcrMode::parse(v)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid ocr mode: {}", v)))?,
        };
        let engine = match self.engine.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(
                OcrProvider::parse(v)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown OCR engine: {}", v)))?,
            ),
        };
        let preview = match self.preview.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "" | "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(AppError::BadRequest(format!("Invalid preview flag: {}", v))),
            },
        };
        Ok(SummaryParams {
            mode,
            engine,
            preview,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub filename: String,
    pub bytes: usize,
    pub sha256: String,
    #[serde(flatten)]
    pub extraction: ExtractionMeta,
    pub elapsed_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub ok: bool,
    pub flat: FlatSummary,
    pub fields: BTreeMap<Field, FieldValue>,
    pub lines: Vec<InvoiceLine>,
    pub meta: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
}

struct Upload {
    filename: String,
    data: Bytes,
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", post(summarize))
        .route("/api/v1/summary", post(summarize))
}

// ============================================================================
// Handlers
// ============================================================================

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::BadRequest(format!("Failed to read upload: {}", err.body_text()))
    }
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").trim().to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if filename.is_empty() {
            return Err(AppError::BadRequest("No file selected".to_string()));
        }
        return Ok(Upload { filename, data });
    }
    Err(AppError::BadRequest("Missing multipart field 'file'".to_string()))
}

/// POST /summary
async fn summarize(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<SummaryResponse>> {
    let started = Instant::now();
    let params = query.validate()?;
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let limits = &state.config().limits;
    let upload = read_upload(multipart, limits.max_upload_bytes).await?;
    let kind = DocumentKind::from_filename(&upload.filename)?;
    kind.check_content_blocking(upload.data.clone()).await?;

    let filename = secure_filename(&upload.filename);
    let sha256 = sha256_hex(&upload.data);
    let key = CacheKey {
        sha256: sha256.clone(),
        mode: params.mode,
        engine: params.engine,
    };

    let (extraction, cached) = match state.results().get(&key) {
        Some(hit) => (hit, true),
        None => {
            let _permit = state
                .jobs()
                .acquire()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let options = ExtractOptions::new(&state.config().ocr, params.mode, params.engine);
            let timeout = state.config().request_timeout();
            let extraction = tokio::time::timeout(
                timeout,
                extract_document(kind, upload.data.to_vec(), &options, state.ocr()),
            )
            .await
            .map_err(|_| AppError::Timeout(timeout.as_secs()))??;

            let extraction = Arc::new(extraction);
            if extraction.is_cacheable() {
                state.results().put(key, extraction.clone());
            } else {
                tracing::debug!(sha256 = %key.sha256, "Degraded OCR result not cached");
            }
            (extraction, false)
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        filename = %filename,
        bytes = upload.data.len(),
        pages = extraction.meta.pages,
        text_source = ?extraction.meta.text_source,
        cached,
        elapsed_ms,
        "Summary served"
    );

    Ok(Json(build_response(
        &extraction,
        ResponseMeta {
            filename,
            bytes: upload.data.len(),
            sha256,
            extraction: extraction.meta.clone(),
            elapsed_ms,
            cached,
        },
        params.preview,
    )))
}

fn build_response(extraction: &Extraction, meta: ResponseMeta, preview: bool) -> SummaryResponse {
    SummaryResponse {
        ok: true,
        flat: extraction.flat.clone(),
        fields: extraction.fields.clone(),
        lines: extraction.lines.clone(),
        meta,
        text_preview: preview.then(|| extraction.text.chars().take(PREVIEW_CHARS).collect()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::ocr::{MockProvider, OcrProviderTrait, OcrService};
    use crate::pdf::fixtures::sample_pdf;
    use crate::state::AppState;

    const BOUNDARY: &str = "invoice-test-boundary";

    fn state_with(config: Config, mock: MockProvider) -> AppState {
        let ocr = OcrService::with_providers(
            "fra",
            vec![Arc::new(mock) as Arc<dyn OcrProviderTrait>],
        );
        AppState::with_ocr(config, ocr)
    }

    fn app_with(config: Config, mock: MockProvider) -> axum::Router {
        crate::app(state_with(config, mock))
    }

    fn app() -> axum::Router {
        app_with(Config::default(), MockProvider::new("Total TTC 42,00 €"))
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, content)))
            .unwrap()
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn png() -> Vec<u8> {
        let mut out = Vec::new();
        image::RgbImage::new(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn invoice_pdf() -> Vec<u8> {
        sample_pdf(&[
            "Facture N FA-77 du 05/06/2024",
            "Total HT 100,00",
            "TVA 20 % 20,00",
            "Total TTC 120,00",
        ])
    }

    #[tokio::test]
    async fn test_summary_pdf() {
        let (status, body) = send(app(), upload("/summary", "file", "facture juin.pdf", &invoice_pdf())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["flat"]["total_ttc"], 120.0);
        assert_eq!(body["flat"]["total_ht"], 100.0);
        assert_eq!(body["flat"]["invoice_date"], "2024-06-05");
        assert!(body["flat"]["buyer"].is_null());
        assert_eq!(body["meta"]["filename"], "facture_juin.pdf");
        assert_eq!(body["meta"]["kind"], "pdf");
        assert_eq!(body["meta"]["text_source"], "text_layer");
        assert_eq!(body["meta"]["sha256"].as_str().unwrap().len(), 64);
        assert_eq!(body["meta"]["cached"], false);
        assert_eq!(body["meta"]["ocr"]["used"], false);
        assert_eq!(body["meta"]["confidences"]["total_ttc"]["source"], "regex");
        assert!(body.get("text_preview").is_none());
    }

    #[tokio::test]
    async fn test_versioned_path_and_cache_hit() {
        let app = app();
        let pdf = invoice_pdf();
        let (_, first) = send(app.clone(), upload("/api/v1/summary", "file", "a.pdf", &pdf)).await;
        let (status, second) = send(app, upload("/api/v1/summary", "file", "b.pdf", &pdf)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["meta"]["cached"], false);
        assert_eq!(second["meta"]["cached"], true);
        assert_eq!(second["meta"]["filename"], "b.pdf");
        assert_eq!(second["flat"], first["flat"]);
    }

    #[tokio::test]
    async fn test_preview() {
        let (_, body) = send(app(), upload("/summary?preview=1", "file", "a.pdf", &invoice_pdf())).await;
        assert!(body["text_preview"].as_str().unwrap().contains("Total TTC"));
    }

    #[tokio::test]
    async fn test_image_forced_ocr() {
        let (status, body) = send(app(), upload("/summary?ocr=force", "file", "scan.PNG", &png())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["kind"], "image");
        assert_eq!(body["meta"]["text_source"], "ocr");
        assert_eq!(body["meta"]["ocr"]["mode"], "always");
        assert_eq!(body["flat"]["total_ttc"], 42.0);
    }

    #[tokio::test]
    async fn test_image_without_ocr() {
        let (status, body) = send(app(), upload("/summary?ocr=never", "file", "scan.jpg", &png())).await;
        // A PNG under a .jpg name still decodes
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["warnings"][0], "ocr disabled for image input");
        assert!(body["flat"]["total_ttc"].is_null());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let (status, body) = send(app(), upload("/summary", "file", "notes.docx", b"PK")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "unsupported_type");
        assert_eq!(body["error"]["message"], "Unsupported extension: .docx");
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let (status, body) = send(app(), upload("/summary", "document", "a.pdf", b"%PDF")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let (status, _) = send(app(), upload("/summary", "file", "", b"%PDF")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_ocr_mode() {
        let (status, body) = send(app(), upload("/summary?ocr=sometimes", "file", "a.pdf", &invoice_pdf())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid ocr mode: sometimes");
    }

    #[tokio::test]
    async fn test_not_multipart() {
        let request = Request::builder()
            .method("POST")
            .uri("/summary")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let (status, body) = send(app(), upload("/summary", "file", "a.pdf", b"GIF89a")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_document");

        let (status, _) = send(app(), upload("/summary", "file", "a.png", b"not a png")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_pinned_engine_unavailable() {
        let (status, body) = send(app(), upload("/summary?engine=ollama", "file", "a.pdf", &invoice_pdf())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "ocr_unavailable");
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let mut config = Config::default();
        config.limits.max_upload_bytes = 256;
        let app = app_with(config, MockProvider::new(""));
        let (status, body) = send(app, upload("/summary", "file", "a.pdf", &vec![b'x'; 4096])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_failed_ocr_is_not_cached() {
        let app = app_with(Config::default(), MockProvider::failing("tesseract crashed"));
        let scan = png();

        let (status, first) = send(app.clone(), upload("/summary", "file", "scan.png", &scan)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(first["meta"]["warnings"][0]
            .as_str()
            .unwrap()
            .starts_with("ocr failed"));
        assert_eq!(first["meta"]["ocr"]["failures"], 1);

        let (_, second) = send(app, upload("/summary", "file", "scan.png", &scan)).await;
        assert_eq!(second["meta"]["cached"], false);
    }

    #[tokio::test]
    async fn test_extraction_timeout() {
        let mut config = Config::default();
        config.limits.request_timeout_secs = 1;
        let slow = MockProvider::new("Total TTC 1,00").with_delay(Duration::from_secs(30));
        let (status, body) = send(app_with(config, slow), upload("/summary", "file", "scan.png", &png())).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "timeout");
        assert_eq!(body["error"]["message"], "Extraction timed out after 1 seconds");
    }

    #[tokio::test]
    async fn test_extractions_wait_for_a_job_permit() {
        let mut config = Config::default();
        config.limits.max_concurrent_jobs = 1;
        config.limits.result_cache_size = 0;
        let state = state_with(config, MockProvider::new(""));
        assert_eq!(state.jobs().available_permits(), 1);

        let held = state.jobs().acquire().await.unwrap();
        let pending = tokio::spawn(send(
            crate::app(state.clone()),
            upload("/summary", "file", "a.pdf", &invoice_pdf()),
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!pending.is_finished());

        drop(held);
        let (status, body) = pending.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["flat"]["total_ttc"], 120.0);
        assert_eq!(state.jobs().available_permits(), 1);
    }
}
