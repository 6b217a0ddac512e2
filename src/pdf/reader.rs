//! PDF access via MuPDF
//!
//! MuPDF documents are not `Send`, so a [`PdfFile`] only keeps the raw bytes
//! and opens a fresh `mupdf::Document` inside each blocking operation.

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;
use mupdf::{Colorspace, Document, Matrix, Page, TextPageOptions};

use super::error::{DocumentError, DocumentResult};
use super::types::{PageImage, PageText, PageTextOrigin, Word};

const PDF_MIME: &str = "application/pdf";

/// Largest raster accepted for OCR, in pixels
const MAX_RENDER_PIXELS: usize = 80_000_000;

/// Check the `%PDF` magic bytes
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes.starts_with(b"%PDF")
}

/// An uploaded PDF
#[derive(Clone)]
pub struct PdfFile {
    data: Arc<Vec<u8>>,
    page_count: usize,
}

impl PdfFile {
    /// Validate and wrap PDF bytes
    pub fn from_bytes(data: Vec<u8>) -> DocumentResult<Self> {
        if !is_pdf(&data) {
            return Err(DocumentError::InvalidContent(
                "file does not start with %PDF".to_string(),
            ));
        }

        let doc = Document::from_bytes(&data, PDF_MIME)
            .map_err(|e| DocumentError::ParseError(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| DocumentError::ParseError(e.to_string()))? as usize;
        if page_count == 0 {
            return Err(DocumentError::InvalidContent("document has no pages".to_string()));
        }

        Ok(Self {
            data: Arc::new(data),
            page_count,
        })
    }

    /// Validate and wrap PDF bytes on a blocking thread
    pub async fn open_blocking(data: Vec<u8>) -> DocumentResult<Self> {
        tokio::task::spawn_blocking(move || Self::from_bytes(data))
            .await
            .map_err(|e| DocumentError::Join(e.to_string()))?
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn open(&self) -> DocumentResult<Document> {
        Document::from_bytes(&self.data, PDF_MIME)
            .map_err(|e| DocumentError::ParseError(e.to_string()))
    }

    /// Extract the text layer of every page. A page MuPDF cannot load or
    /// read makes the document unreadable.
    pub fn read_text_layer(&self) -> DocumentResult<Vec<PageText>> {
        let doc = self.open()?;
        let mut pages = Vec::with_capacity(self.page_count);

        for index in 0..self.page_count {
            let (text, words) = doc
                .load_page(index as i32)
                .map_err(DocumentError::from)
                .and_then(|page| page_text_and_words(&page))
                .map_err(|e| page_error(index, e))?;
            pages.push(PageText {
                index,
                text,
                words,
                origin: PageTextOrigin::TextLayer,
            });
        }

        Ok(pages)
    }

    /// Rasterize one page to PNG at the given DPI
    pub fn render_page_png(&self, index: usize, dpi: u32) -> DocumentResult<PageImage> {
        if index >= self.page_count {
            return Err(DocumentError::PageNotFound(index));
        }

        let doc = self.open()?;
        let page = doc.load_page(index as i32)?;

        let scale = dpi as f32 / 72.0;
        let bounds = page.bounds()?;
        render_budget(
            ((bounds.x1 - bounds.x0) * scale).ceil() as usize,
            ((bounds.y1 - bounds.y0) * scale).ceil() as usize,
        )?;
        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

        let (png, width, height) = encode_pixmap_png(&pixmap)?;
        Ok(PageImage {
            index,
            png,
            width,
            height,
        })
    }

    /// Read the text layer on a blocking thread
    pub async fn read_text_layer_blocking(&self) -> DocumentResult<Vec<PageText>> {
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.read_text_layer())
            .await
            .map_err(|e| DocumentError::Join(e.to_string()))?
    }

    /// Rasterize a page on a blocking thread
    pub async fn render_page_png_blocking(&self, index: usize, dpi: u32) -> DocumentResult<PageImage> {
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.render_page_png(index, dpi))
            .await
            .map_err(|e| DocumentError::Join(e.to_string()))?
    }
}

fn page_error(index: usize, err: DocumentError) -> DocumentError {
    DocumentError::ParseError(format!("page {}: {}", index + 1, err))
}

/// Byte size of an RGB raster, refused above [`MAX_RENDER_PIXELS`]
fn render_budget(width: usize, height: usize) -> DocumentResult<usize> {
    let too_large = || DocumentError::RenderError(format!("page raster {}x{} is too large", width, height));
    let pixels = width.checked_mul(height).ok_or_else(too_large)?;
    if pixels > MAX_RENDER_PIXELS {
        return Err(too_large());
    }
    pixels.checked_mul(3).ok_or_else(too_large)
}

/// Plain text plus whitespace-delimited words with their boxes
fn page_text_and_words(page: &Page) -> DocumentResult<(String, Vec<Word>)> {
    let text_page = page.to_text_page(TextPageOptions::empty())?;
    let text = text_page.to_text()?;

    let mut words = Vec::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            let mut builder = WordBuilder::default();
            for ch in line.chars() {
                let Some(c) = ch.char() else { continue };
                if c.is_whitespace() {
                    builder.flush(&mut words);
                    continue;
                }
                let quad = ch.quad();
                builder.push(
                    c,
                    quad.ul.x.min(quad.ll.x),
                    quad.ur.x.max(quad.lr.x),
                    quad.ul.y.min(quad.ur.y),
                    quad.ll.y.max(quad.lr.y),
                );
            }
            builder.flush(&mut words);
        }
    }

    Ok((text, words))
}

/// Accumulates characters into a word and its bounding box
#[derive(Default)]
struct WordBuilder {
    text: String,
    x0: f32,
    x1: f32,
    top: f32,
    bottom: f32,
}

impl WordBuilder {
    fn push(&mut self, c: char, x0: f32, x1: f32, top: f32, bottom: f32) {
        if self.text.is_empty() {
            self.x0 = x0;
            self.x1 = x1;
            self.top = top;
            self.bottom = bottom;
        } else {
            self.x0 = self.x0.min(x0);
            self.x1 = self.x1.max(x1);
            self.top = self.top.min(top);
            self.bottom = self.bottom.max(bottom);
        }
        self.text.push(c);
    }

    fn flush(&mut self, words: &mut Vec<Word>) {
        if self.text.is_empty() {
            return;
        }
        words.push(Word {
            text: std::mem::take(&mut self.text),
            x0: self.x0,
            x1: self.x1,
            top: self.top,
            bottom: self.bottom,
        });
    }
}

fn encode_pixmap_png(pixmap: &mupdf::Pixmap) -> DocumentResult<(Vec<u8>, u32, u32)> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgb = Vec::with_capacity(render_budget(width as usize, height as usize)?);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            if n >= 3 {
                let r = samples.get(offset).copied().unwrap_or(255);
                let g = samples.get(offset + 1).copied().unwrap_or(255);
                let b = samples.get(offset + 2).copied().unwrap_or(255);
                rgb.extend_from_slice(&[r, g, b]);
            } else {
                let v = samples.get(offset).copied().unwrap_or(255);
                rgb.extend_from_slice(&[v, v, v]);
            }
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| DocumentError::ImageError(e.to_string()))?;

    Ok((output, width, height))
}
