//! Invoice Extraction Module
//!
//! Turns the text of a PDF or scanned invoice into structured fields.
//!
//! - `patterns`, `amounts`, `dates`: shared regexes and normalisation
//! - `fields`, `summary`: whole-text rules
//! - `lines`, `xpos`: line items from text columns or word positions
//! - `extractors`, `orchestrator`: weighted candidates and arbitration
//! - `document`: the pipeline from uploaded bytes to an [`Extraction`]

mod amounts;
mod candidates;
mod dates;
mod document;
mod extractors;
mod fields;
mod lines;
mod orchestrator;
mod patterns;
mod summary;
mod validators;
mod xpos;

pub use amounts::{parse_amount, HeaderRole};
pub use candidates::{Candidate, Field, FieldValue, Source};
pub use dates::find_invoice_date;
pub use document::{
    extract_document, ExtractOptions, Extraction, ExtractionMeta, FlatSummary, OcrMeta, OcrMode,
    TextSource,
};
pub use extractors::{default_extractors, Extractor, ExtractorInput};
pub use fields::{fill_fields_from_text, RawFields};
pub use lines::{extract_lines, parse_lines_columns, parse_lines_regex, InvoiceLine, LinesStrategy};
pub use orchestrator::{resolve_fields, run_extractors, Alternative, FieldConfidence, Resolution};
pub use patterns::PATTERNS_VERSION;
pub use summary::{summarize_from_text, InvoiceSummary};
pub use validators::soft_validate;
pub use xpos::parse_lines_by_xpos;
