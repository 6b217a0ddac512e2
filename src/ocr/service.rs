//! OCR Service
//!
//! Orchestrates OCR providers in their configured order.

use std::sync::Arc;
use std::time::Duration;

use super::{
    provider::{OcrProviderTrait, OllamaProvider, TesseractOptions, TesseractProvider},
    types::{OcrError, OcrProvider, OcrResult},
};
use crate::config::OcrConfig;

/// OCR service for scanned pages and images
pub struct OcrService {
    language: String,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrService {
    /// Create the service from configuration. Tesseract is always registered;
    /// Ollama only when a URL is configured.
    pub fn new(config: &OcrConfig) -> Self {
        let mut providers: Vec<Arc<dyn OcrProviderTrait>> = vec![Arc::new(TesseractProvider::new(
            TesseractOptions {
                command: config.tesseract_cmd.clone(),
                tessdata_prefix: config.tessdata_prefix.clone(),
                psm: config.psm,
                timeout: Duration::from_secs(config.timeout_secs),
            },
        ))];

        if let Some(url) = &config.ollama_url {
            providers.push(Arc::new(OllamaProvider::new(
                url,
                &config.ollama_model,
                Duration::from_secs(config.timeout_secs),
            )));
        }

        Self::with_providers(&config.language, providers)
    }

    /// Create a service over an explicit provider list
    pub fn with_providers(language: &str, providers: Vec<Arc<dyn OcrProviderTrait>>) -> Self {
        Self {
            language: language.to_string(),
            providers,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.provider_type());
            }
        }
        available
    }

    /// Check that a pinned provider is configured and reachable
    pub async fn ensure_available(&self, provider: OcrProvider) -> Result<(), OcrError> {
        let configured = self
            .providers
            .iter()
            .find(|p| p.provider_type() == provider)
            .ok_or_else(|| {
                OcrError::ProviderNotAvailable(format!("{} is not configured", provider.as_str()))
            })?;

        if configured.is_available().await {
            Ok(())
        } else {
            Err(OcrError::ProviderNotAvailable(format!(
                "{} is not available",
                provider.as_str()
            )))
        }
    }

    /// Perform OCR on an encoded image
    pub async fn recognize(
        &self,
        image_data: &[u8],
        preferred_provider: Option<OcrProvider>,
    ) -> Result<OcrResult, OcrError> {
        let lang = self.language.as_str();

        if let Some(preferred) = preferred_provider {
            let provider = self
                .providers
                .iter()
                .find(|p| p.provider_type() == preferred)
                .ok_or_else(|| {
                    OcrError::ProviderNotAvailable(format!(
                        "{} is not configured",
                        preferred.as_str()
                    ))
                })?;
            if !provider.is_available().await {
                return Err(OcrError::ProviderNotAvailable(format!(
                    "{} is not available",
                    preferred.as_str()
                )));
            }
            return provider.recognize(image_data, lang).await;
        }

        let mut last_error = None;
        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }
            match provider.recognize(image_data, lang).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.provider_type().as_str(),
                        "OCR provider failed: {}, trying next",
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(OcrError::ProviderNotAvailable(match last_error {
            Some(e) => format!("all OCR providers failed, last error: {}", e),
            None => "No OCR providers available".to_string(),
        }))
    }
}
