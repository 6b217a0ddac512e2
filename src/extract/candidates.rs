//! Field candidates produced by the extractors

use std::fmt;

use serde::Serialize;

/// Invoice fields the extractors know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    InvoiceNumber,
    InvoiceDate,
    Seller,
    Buyer,
    TotalHt,
    TotalTva,
    TotalTtc,
    Currency,
    SellerSiret,
    SellerSiren,
    SellerTva,
    SellerIban,
}

impl Field {
    pub fn is_total(&self) -> bool {
        matches!(self, Field::TotalHt | Field::TotalTva | Field::TotalTtc)
    }
}

/// A candidate value: text or a monetary amount
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Amount(f64),
}

impl FieldValue {
    /// Numeric reading of the value, parsing text amounts
    pub fn as_amount(&self) -> Option<f64> {
        match self {
            FieldValue::Amount(v) => Some(*v),
            FieldValue::Text(s) => super::amounts::parse_amount(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Amount(v) => !v.is_finite(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Amount(v) => write!(f, "{}", v),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Amount(v)
    }
}

/// Which extractor produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    #[serde(rename = "regex")]
    Regex,
    #[serde(rename = "summary")]
    Summary,
    #[serde(rename = "label-prox")]
    LabelProximity,
    #[serde(rename = "xpos")]
    XPos,
    #[serde(rename = "table")]
    Table,
}

impl Source {
    /// Trust placed in each extractor
    pub fn weight(&self) -> f64 {
        match self {
            Source::Regex => 1.00,
            Source::LabelProximity | Source::XPos | Source::Table => 0.95,
            Source::Summary => 0.90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub field: Field,
    pub value: FieldValue,
    /// 0..1
    pub conf: f64,
    pub source: Source,
}

impl Candidate {
    pub fn new(field: Field, value: impl Into<FieldValue>, conf: f64, source: Source) -> Self {
        Self {
            field,
            value: value.into(),
            conf,
            source,
        }
    }
}
