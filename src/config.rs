//! Configuration management for the invoice OCR server

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Tesseract executable
    pub tesseract_cmd: String,
    /// Forwarded to tesseract as `TESSDATA_PREFIX` when set
    pub tessdata_prefix: Option<String>,
    /// Tesseract language(s), e.g. `fra` or `fra+eng`
    pub language: String,
    /// Rasterization DPI for scanned PDF pages
    pub dpi: u32,
    /// Tesseract page segmentation mode
    pub psm: u8,
    /// Upper bound on OCR'd pages per document
    pub max_pages: usize,
    /// Per-page tesseract timeout in seconds
    pub timeout_secs: u64,
    /// In auto mode, pages whose text layer holds fewer non-whitespace
    /// characters than this are OCR'd
    pub min_text_chars: usize,
    pub ollama_url: Option<String>,
    pub ollama_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
    pub max_concurrent_jobs: usize,
    pub result_cache_size: usize,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            ocr: OcrConfig {
                tesseract_cmd: "tesseract".to_string(),
                tessdata_prefix: None,
                language: "fra".to_string(),
                dpi: 200,
                psm: 3,
                max_pages: 20,
                timeout_secs: 60,
                min_text_chars: 30,
                ollama_url: None,
                ollama_model: "llava".to_string(),
            },
            limits: LimitsConfig {
                max_upload_bytes: 25 * 1024 * 1024,
                request_timeout_secs: 120,
                max_concurrent_jobs: 8,
                result_cache_size: 64,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Missing variables take their default; present but unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Config {
            server: ServerConfig {
                host: non_empty("HOST").unwrap_or(defaults.server.host),
                port: parse_var(&lookup, "PORT", defaults.server.port)?,
            },
            ocr: OcrConfig {
                tesseract_cmd: non_empty("TESSERACT_CMD").unwrap_or(defaults.ocr.tesseract_cmd),
                tessdata_prefix: non_empty("TESSDATA_PREFIX"),
                language: non_empty("OCR_LANG").unwrap_or(defaults.ocr.language),
                dpi: parse_var(&lookup, "OCR_DPI", defaults.ocr.dpi)?.clamp(72, 600),
                psm: parse_var(&lookup, "OCR_PSM", defaults.ocr.psm)?,
                max_pages: parse_var(&lookup, "OCR_MAX_PAGES", defaults.ocr.max_pages)?,
                timeout_secs: parse_var(&lookup, "OCR_TIMEOUT_SECS", defaults.ocr.timeout_secs)?,
                min_text_chars: parse_var(
                    &lookup,
                    "OCR_MIN_TEXT_CHARS",
                    defaults.ocr.min_text_chars,
                )?,
                ollama_url: non_empty("OLLAMA_URL"),
                ollama_model: non_empty("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
            limits: LimitsConfig {
                max_upload_bytes: parse_var(
                    &lookup,
                    "MAX_UPLOAD_BYTES",
                    defaults.limits.max_upload_bytes,
                )?,
                request_timeout_secs: parse_var(
                    &lookup,
                    "REQUEST_TIMEOUT_SECS",
                    defaults.limits.request_timeout_secs,
                )?,
                max_concurrent_jobs: parse_var(
                    &lookup,
                    "MAX_CONCURRENT_JOBS",
                    defaults.limits.max_concurrent_jobs,
                )?
                .max(1),
                result_cache_size: parse_var(
                    &lookup,
                    "RESULT_CACHE_SIZE",
                    defaults.limits.result_cache_size,
                )?,
            },
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.request_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue { name, value: raw })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_env_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.ocr.language, "fra");
        assert_eq!(config.ocr.dpi, 200);
        assert!(config.ocr.tessdata_prefix.is_none());
        assert_eq!(config.limits.request_timeout_secs, 120);
    }

    #[test]
    fn test_port_and_tessdata_override() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "10000"),
            ("TESSDATA_PREFIX", "/usr/share/tesseract-ocr/5/tessdata"),
            ("OCR_LANG", "fra+eng"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 10000);
        assert_eq!(
            config.ocr.tessdata_prefix.as_deref(),
            Some("/usr/share/tesseract-ocr/5/tessdata")
        );
        assert_eq!(config.ocr.language, "fra+eng");
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_dpi_is_clamped_and_jobs_at_least_one() {
        let config = Config::from_lookup(lookup_from(&[
            ("OCR_DPI", "5000"),
            ("MAX_CONCURRENT_JOBS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.ocr.dpi, 600);
        assert_eq!(config.limits.max_concurrent_jobs, 1);
    }
}
