//! Page-level text and image types

use serde::Serialize;

/// Separator placed between page texts when a document is flattened
pub const PAGE_SEPARATOR: &str = "\n\f\n";

/// A positioned word, in PDF points with the origin at the top-left corner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Word {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Word {
    pub fn x_mid(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn y_mid(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Where a page's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTextOrigin {
    TextLayer,
    Ocr,
}

/// Text content of a single page
#[derive(Debug, Clone)]
pub struct PageText {
    /// Zero-based page index
    pub index: usize,
    pub text: String,
    pub words: Vec<Word>,
    pub origin: PageTextOrigin,
}

impl PageText {
    /// Number of non-whitespace characters
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// A rasterized page
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Join page texts with the page separator
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
        .trim()
        .to_string()
}
