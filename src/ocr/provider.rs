//! OCR Providers
//!
//! Defines the provider trait and implementations for different OCR backends.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::tsv::parse_tsv;
use super::types::{OcrError, OcrProvider, OcrResult};

/// OCR provider trait
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Perform OCR on an encoded image (PNG or JPEG)
    async fn recognize(&self, image_data: &[u8], language: &str) -> Result<OcrResult, OcrError>;
}

/// Tesseract settings
#[derive(Debug, Clone)]
pub struct TesseractOptions {
    pub command: String,
    pub tessdata_prefix: Option<String>,
    pub psm: u8,
    pub timeout: Duration,
}

impl Default for TesseractOptions {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            tessdata_prefix: None,
            psm: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Tesseract OCR provider, driving the `tesseract` binary
pub struct TesseractProvider {
    options: TesseractOptions,
    /// Set once `tesseract --version` has succeeded
    confirmed: AtomicBool,
}

impl TesseractProvider {
    pub fn new(options: TesseractOptions) -> Self {
        Self {
            options,
            confirmed: AtomicBool::new(false),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.options.command);
        if let Some(prefix) = &self.options.tessdata_prefix {
            cmd.env("TESSDATA_PREFIX", prefix);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

/// Temp file removed on drop
struct TempImage(PathBuf);

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn image_extension(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Tiff) => "tif",
        _ => "png",
    }
}

#[async_trait]
impl OcrProviderTrait for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        if self.confirmed.load(Ordering::Relaxed) {
            return true;
        }
        let mut version = self.command();
        version.arg("--version");
        let ok = matches!(
            tokio::time::timeout(self.options.timeout, version.output()).await,
            Ok(Ok(output)) if output.status.success()
        );
        if ok {
            self.confirmed.store(true, Ordering::Relaxed);
        }
        ok
    }

    async fn recognize(&self, image_data: &[u8], language: &str) -> Result<OcrResult, OcrError> {
        let input = TempImage(std::env::temp_dir().join(format!(
            "ocr_input_{}.{}",
            uuid::Uuid::new_v4(),
            image_extension(image_data)
        )));

        tokio::fs::write(&input.0, image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        let mut cmd = self.command();
        cmd.arg(&input.0)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(self.options.psm.to_string())
            .arg("tsv");

        let output = tokio::time::timeout(self.options.timeout, cmd.output())
            .await
            .map_err(|_| OcrError::Timeout(self.options.timeout.as_secs()))?
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let page = parse_tsv(&String::from_utf8_lossy(&output.stdout));

        Ok(OcrResult {
            text: page.text,
            confidence: page.confidence,
            provider: OcrProvider::Tesseract,
            words: Some(page.words),
        })
    }
}

const OLLAMA_PROMPT: &str = "Transcribe every line of this scanned invoice exactly as printed, \
     one output line per printed line, keeping amounts, dates and identifiers verbatim. \
     Do not summarise or translate.";

/// Confidence reported for Ollama output, which carries no score
const OLLAMA_CONFIDENCE: f64 = 75.0;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: [String; 1],
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama vision model provider
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    /// Model name (e.g. "llava"); an untagged name matches any tag
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn has_model(&self, tags: &TagsResponse) -> bool {
        tags.models.iter().any(|m| {
            m.name == self.model
                || (!self.model.contains(':')
                    && m.name.split(':').next() == Some(self.model.as_str()))
        })
    }
}

#[async_trait]
impl OcrProviderTrait for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    /// Reachable and serving the configured model
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return false,
        };
        match response.json::<TagsResponse>().await {
            Ok(tags) => self.has_model(&tags),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image_data: &[u8], language: &str) -> Result<OcrResult, OcrError> {
        use base64::Engine;

        let request = GenerateRequest {
            model: &self.model,
            prompt: format!("{} Language code: {}.", OLLAMA_PROMPT, language),
            images: [base64::engine::general_purpose::STANDARD.encode(image_data)],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status,
                body.trim()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = generated.response.trim();
        if text.is_empty() {
            return Err(OcrError::ProcessingError(format!(
                "{} returned no text",
                self.model
            )));
        }

        Ok(OcrResult {
            text: text.to_string(),
            confidence: OLLAMA_CONFIDENCE,
            provider: OcrProvider::Ollama,
            words: None,
        })
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub response: OcrResult,
    pub available: bool,
    /// Each call sleeps this long before answering
    pub delay: Option<Duration>,
    /// Calls fail with `ProcessingError` carrying this message
    pub fail_with: Option<String>,
    /// Texts answered in order before falling back to `response`
    queued: parking_lot::Mutex<std::collections::VecDeque<String>>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(text: &str) -> Self {
        Self {
            response: OcrResult {
                text: text.to_string(),
                confidence: 90.0,
                provider: OcrProvider::Tesseract,
                words: None,
            },
            available: true,
            delay: None,
            fail_with: None,
            queued: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer `texts` one per call, then `response`
    pub fn with_queue(self, texts: &[&str]) -> Self {
        self.queued.lock().extend(texts.iter().map(|t| t.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.response.provider
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: &str) -> Result<OcrResult, OcrError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(OcrError::ProcessingError(message.clone()));
        }
        let next = self.queued.lock().pop_front();
        Ok(match next {
            Some(text) => OcrResult {
                text,
                ..self.response.clone()
            },
            None => self.response.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_image_extension_sniffing() {
        assert_eq!(image_extension(b"\xFF\xD8\xFF\xE0rest"), "jpg");
        assert_eq!(image_extension(b"\x89PNG\r\n\x1a\nrest"), "png");
        assert_eq!(image_extension(b"garbage"), "png");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let provider = TesseractProvider::new(TesseractOptions {
            command: "definitely-not-a-real-tesseract-binary".to_string(),
            ..Default::default()
        });
        assert!(!provider.is_available().await);

        let result = provider.recognize(b"\x89PNG\r\n\x1a\n", "fra").await;
        assert!(matches!(result, Err(OcrError::ProcessingError(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tesseract_availability_is_remembered() {
        let provider = TesseractProvider::new(TesseractOptions {
            command: "true".to_string(),
            ..Default::default()
        });
        assert!(!provider.confirmed.load(Ordering::Relaxed));
        assert!(provider.is_available().await);
        assert!(provider.confirmed.load(Ordering::Relaxed));
    }

    /// Local stand-in for the Ollama API
    async fn ollama_stub(status: StatusCode, generated: &'static str) -> String {
        let app = Router::new()
            .route(
                "/api/tags",
                get(|| async { Json(json!({"models": [{"name": "llava:latest"}]})) }),
            )
            .route(
                "/api/generate",
                post(move |Json(body): Json<Value>| async move {
                    assert_eq!(body["model"], "llava");
                    assert_eq!(body["stream"], false);
                    assert!(body["prompt"].as_str().unwrap().contains("fra"));
                    assert_eq!(body["images"].as_array().unwrap().len(), 1);
                    (status, Json(json!({"response": generated})))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn ollama(url: &str, model: &str) -> OllamaProvider {
        OllamaProvider::new(url, model, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_ollama_recognize() {
        let url = ollama_stub(StatusCode::OK, "  Facture N° 12\nTotal TTC 42,00 €\n").await;
        let provider = ollama(&url, "llava");
        assert!(!provider.base_url.ends_with('/'));
        assert!(provider.is_available().await);

        let result = provider.recognize(b"\x89PNG", "fra").await.unwrap();
        assert_eq!(result.text, "Facture N° 12\nTotal TTC 42,00 €");
        assert_eq!(result.provider, OcrProvider::Ollama);
        assert_eq!(result.confidence, OLLAMA_CONFIDENCE);
        assert!(result.words.is_none());
    }

    #[tokio::test]
    async fn test_ollama_missing_model_is_unavailable() {
        let url = ollama_stub(StatusCode::OK, "x").await;
        assert!(!ollama(&url, "llava:13b").is_available().await);
        assert!(!ollama(&url, "bakllava").is_available().await);
        assert!(ollama(&url, "llava:latest").is_available().await);
    }

    #[tokio::test]
    async fn test_ollama_error_status() {
        let url = ollama_stub(StatusCode::INTERNAL_SERVER_ERROR, "").await;
        let result = ollama(&url, "llava").recognize(b"img", "fra").await;
        match result {
            Err(OcrError::ApiError(msg)) => assert!(msg.contains("500")),
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ollama_empty_response_is_an_error() {
        let url = ollama_stub(StatusCode::OK, "   \n").await;
        let result = ollama(&url, "llava").recognize(b"img", "fra").await;
        assert!(matches!(result, Err(OcrError::ProcessingError(_))));
    }
}
