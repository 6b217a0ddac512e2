//! Document pipeline: text layer, OCR, line items, extraction

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::candidates::{Field, FieldValue};
use super::extractors::{default_extractors, ExtractorInput};
use super::lines::{extract_lines, InvoiceLine, LinesStrategy};
use super::orchestrator::{resolve_fields, run_extractors, FieldConfidence};
use super::patterns::PATTERNS_VERSION;
use crate::config::OcrConfig;
use crate::error::{AppError, Result};
use crate::ocr::{OcrProvider, OcrResult, OcrService, OcrWord};
use crate::pdf::{join_pages, PageText, PageTextOrigin, PdfFile, Word};
use crate::upload::DocumentKind;

/// When to run OCR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Only pages without a usable text layer
    #[default]
    Auto,
    Always,
    Never,
}

impl OcrMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Some(OcrMode::Auto),
            "always" | "force" | "on" | "true" | "1" => Some(OcrMode::Always),
            "never" | "off" | "false" | "0" | "none" => Some(OcrMode::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMode::Auto => "auto",
            OcrMode::Always => "always",
            OcrMode::Never => "never",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub mode: OcrMode,
    /// Pinned OCR engine
    pub engine: Option<OcrProvider>,
    pub dpi: u32,
    pub max_pages: usize,
    pub min_text_chars: usize,
}

impl ExtractOptions {
    pub fn new(config: &OcrConfig, mode: OcrMode, engine: Option<OcrProvider>) -> Self {
        Self {
            mode,
            engine,
            dpi: config.dpi,
            max_pages: config.max_pages,
            min_text_chars: config.min_text_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    TextLayer,
    Ocr,
    Mixed,
    None,
}

impl TextSource {
    fn of(pages: &[PageText]) -> Self {
        let filled: Vec<&PageText> = pages.iter().filter(|p| p.char_count() > 0).collect();
        if filled.is_empty() {
            return TextSource::None;
        }
        let ocr = filled.iter().filter(|p| p.origin == PageTextOrigin::Ocr).count();
        match ocr {
            0 => TextSource::TextLayer,
            n if n == filled.len() => TextSource::Ocr,
            _ => TextSource::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrMeta {
    pub mode: OcrMode,
    pub used: bool,
    pub engine: Option<OcrProvider>,
    pub lang: String,
    pub dpi: u32,
    /// 1-based numbers of the pages whose text came from OCR
    pub pages: Vec<usize>,
    /// Mean engine confidence (0-100) over those pages
    pub confidence: Option<f64>,
    /// Pages whose render or OCR call failed
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionMeta {
    pub kind: DocumentKind,
    pub pages: usize,
    pub text_source: TextSource,
    pub text_chars: usize,
    pub ocr: OcrMeta,
    pub lines_strategy: LinesStrategy,
    pub lines_count: usize,
    pub confidences: BTreeMap<Field, FieldConfidence>,
    pub derived: Vec<Field>,
    pub warnings: Vec<String>,
    pub patterns_version: &'static str,
}

/// The seven headline fields, `null` when missing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlatSummary {
    pub invoice_number: Option<FieldValue>,
    pub invoice_date: Option<FieldValue>,
    pub seller: Option<FieldValue>,
    pub buyer: Option<FieldValue>,
    pub total_ht: Option<FieldValue>,
    pub total_tva: Option<FieldValue>,
    pub total_ttc: Option<FieldValue>,
}

impl FlatSummary {
    fn from_fields(fields: &BTreeMap<Field, FieldValue>) -> Self {
        let get = |f: Field| fields.get(&f).cloned();
        Self {
            invoice_number: get(Field::InvoiceNumber),
            invoice_date: get(Field::InvoiceDate),
            seller: get(Field::Seller),
            buyer: get(Field::Buyer),
            total_ht: get(Field::TotalHt),
            total_tva: get(Field::TotalTva),
            total_ttc: get(Field::TotalTtc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub flat: FlatSummary,
    pub fields: BTreeMap<Field, FieldValue>,
    pub lines: Vec<InvoiceLine>,
    pub meta: ExtractionMeta,
    /// Analysed text, pages joined
    #[serde(skip)]
    pub text: String,
}

impl Extraction {
    /// A result degraded by a failed render or OCR call is not worth reusing
    pub fn is_cacheable(&self) -> bool {
        self.meta.ocr.failures == 0
    }
}

#[derive(Default)]
struct OcrTally {
    engine: Option<OcrProvider>,
    pages: Vec<usize>,
    confidences: Vec<f64>,
    failures: usize,
}

impl OcrTally {
    fn record(&mut self, index: usize, result: &OcrResult) {
        self.engine.get_or_insert(result.provider);
        self.pages.push(index + 1);
        self.confidences.push(result.confidence);
    }

    fn mean_confidence(&self) -> Option<f64> {
        if self.confidences.is_empty() {
            return None;
        }
        let mean = self.confidences.iter().sum::<f64>() / self.confidences.len() as f64;
        Some((mean * 10.0).round() / 10.0)
    }
}

/// Convert OCR pixel boxes to PDF points
fn ocr_words(words: &[OcrWord], dpi: u32) -> Vec<Word> {
    let scale = 72.0 / dpi.max(1) as f32;
    words
        .iter()
        .map(|w| Word {
            text: w.text.clone(),
            x0: w.left as f32 * scale,
            x1: (w.left + w.width) as f32 * scale,
            top: w.top as f32 * scale,
            bottom: (w.top + w.height) as f32 * scale,
        })
        .collect()
}

/// Replace a page's content with OCR output, unless the OCR text is empty
fn apply_ocr(page: &mut PageText, result: &OcrResult, dpi: u32, tally: &mut OcrTally) -> bool {
    if result.text.trim().is_empty() {
        return false;
    }
    page.text = result.text.clone();
    page.words = result
        .words
        .as_deref()
        .map(|w| ocr_words(w, dpi))
        .unwrap_or_default();
    page.origin = PageTextOrigin::Ocr;
    tally.record(page.index, result);
    true
}

/// Pages to OCR for a given mode, capped at `max_pages`
fn ocr_targets(pages: &[PageText], options: &ExtractOptions) -> Vec<usize> {
    let wanted = pages.iter().filter(|p| match options.mode {
        OcrMode::Never => false,
        OcrMode::Always => true,
        OcrMode::Auto => p.char_count() < options.min_text_chars,
    });
    wanted.map(|p| p.index).take(options.max_pages).collect()
}

async fn pdf_pages(
    bytes: Vec<u8>,
    options: &ExtractOptions,
    ocr: &OcrService,
    tally: &mut OcrTally,
    warnings: &mut Vec<String>,
) -> Result<Vec<PageText>> {
    let pdf = PdfFile::open_blocking(bytes).await?;
    let mut pages = pdf.read_text_layer_blocking().await?;

    let targets = ocr_targets(&pages, options);
    let eligible = pages
        .iter()
        .filter(|p| options.mode == OcrMode::Always || p.char_count() < options.min_text_chars)
        .count();
    if options.mode != OcrMode::Never && eligible > targets.len() {
        warnings.push(format!("ocr limited to the first {} pages", options.max_pages));
    }

    for index in targets {
        let image = match pdf.render_page_png_blocking(index, options.dpi).await {
            Ok(image) => image,
            Err(e) => {
                warn!(page = index + 1, "Page render failed: {}", e);
                warnings.push(format!("page {}: render failed: {}", index + 1, e));
                tally.failures += 1;
                continue;
            }
        };
        match ocr.recognize(&image.png, options.engine).await {
            Ok(result) => {
                if !apply_ocr(&mut pages[index], &result, options.dpi, tally) {
                    debug!(page = index + 1, "OCR returned no text, keeping text layer");
                }
            }
            Err(e) => {
                warn!(page = index + 1, "OCR failed: {}", e);
                warnings.push(format!("page {}: ocr failed: {}", index + 1, e));
                tally.failures += 1;
            }
        }
    }
    Ok(pages)
}

async fn image_pages(
    bytes: &[u8],
    options: &ExtractOptions,
    ocr: &OcrService,
    tally: &mut OcrTally,
    warnings: &mut Vec<String>,
) -> Vec<PageText> {
    let mut page = PageText {
        index: 0,
        text: String::new(),
        words: Vec::new(),
        origin: PageTextOrigin::Ocr,
    };
    if options.mode == OcrMode::Never {
        warnings.push("ocr disabled for image input".to_string());
        return vec![page];
    }
    match ocr.recognize(bytes, options.engine).await {
        Ok(result) => {
            apply_ocr(&mut page, &result, options.dpi, tally);
        }
        Err(e) => {
            warn!("Image OCR failed: {}", e);
            warnings.push(format!("ocr failed: {}", e));
            tally.failures += 1;
        }
    }
    vec![page]
}

/// Run the whole pipeline on an uploaded document.
///
/// OCR failures end up in `meta.warnings`; only an unreadable document or
/// an unavailable pinned engine fails the call.
pub async fn extract_document(
    kind: DocumentKind,
    bytes: Vec<u8>,
    options: &ExtractOptions,
    ocr: &OcrService,
) -> Result<Extraction> {
    let started = Instant::now();

    if let (Some(engine), false) = (options.engine, options.mode == OcrMode::Never) {
        ocr.ensure_available(engine).await.map_err(AppError::from)?;
    }

    let mut tally = OcrTally::default();
    let mut warnings = Vec::new();
    let pages = match kind {
        DocumentKind::Pdf => pdf_pages(bytes, options, ocr, &mut tally, &mut warnings).await?,
        DocumentKind::Image => image_pages(&bytes, options, ocr, &mut tally, &mut warnings).await,
    };

    let text = join_pages(&pages);
    let text_source = TextSource::of(&pages);
    let (lines_strategy, lines) = extract_lines(&pages, &text);

    let extractors = default_extractors();
    let candidates = run_extractors(
        &extractors,
        &ExtractorInput {
            text: &text,
            lines: &lines,
        },
    );
    debug!(candidates = candidates.len(), "Candidates collected");
    let resolution = resolve_fields(candidates);

    let meta = ExtractionMeta {
        kind,
        pages: pages.len(),
        text_source,
        text_chars: text.chars().count(),
        ocr: OcrMeta {
            mode: options.mode,
            used: !tally.pages.is_empty(),
            engine: tally.engine,
            lang: ocr.language().to_string(),
            dpi: options.dpi,
            confidence: tally.mean_confidence(),
            failures: tally.failures,
            pages: tally.pages,
        },
        lines_strategy,
        lines_count: lines.len(),
        confidences: resolution.confidences,
        derived: resolution.derived,
        warnings,
        patterns_version: PATTERNS_VERSION,
    };

    info!(
        pages = meta.pages,
        text_source = ?meta.text_source,
        lines = meta.lines_count,
        fields = resolution.fields.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Document extracted"
    );

    Ok(Extraction {
        flat: FlatSummary::from_fields(&resolution.fields),
        fields: resolution.fields,
        lines,
        meta,
        text,
    })
}
