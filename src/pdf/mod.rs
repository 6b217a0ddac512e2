//! PDF Module
//!
//! Text layer extraction and page rasterization through MuPDF.
//!
//! ```rust,ignore
//! let pdf = PdfFile::from_bytes(bytes)?;
//! let pages = pdf.read_text_layer_blocking().await?;
//! let scan = pdf.render_page_png_blocking(0, 200).await?;
//! ```

mod error;
mod reader;
mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{DocumentError, DocumentResult};
pub use reader::{is_pdf, PdfFile};
pub use types::{join_pages, PageImage, PageText, PageTextOrigin, Word, PAGE_SEPARATOR};
