//! Heuristic invoice summary from raw text (scanned or text layer)

use chrono::NaiveDate;
use regex::Regex;

use super::amounts::last_monetary_amount;
use super::dates::find_invoice_date;
use super::fields::labelled_token;
use super::patterns::{
    BARE_SIREN_RE, BARE_SIRET_RE, IBAN_FR_RE, SIRET_RE, SUMMARY_HT_LABEL_RE,
    SUMMARY_NUMBER_RE, SUMMARY_TTC_LABEL_RE, SUMMARY_TVA_LABEL_RE, VAT_INTRA_RE,
};

/// How far past a total label an amount may sit
const LABEL_WINDOW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceSummary {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub seller_tva: Option<String>,
    pub seller_siret: Option<String>,
    pub seller_iban: Option<String>,
    pub total_ht: Option<f64>,
    pub total_tva: Option<f64>,
    pub total_ttc: Option<f64>,
    pub currency: &'static str,
}

pub fn summarize_from_text(text: &str) -> InvoiceSummary {
    InvoiceSummary {
        invoice_number: labelled_token(&SUMMARY_NUMBER_RE, text),
        invoice_date: find_invoice_date(text),
        seller_tva: VAT_INTRA_RE.find(text).map(|m| compact(m.as_str())),
        seller_siret: find_siret(text),
        seller_iban: IBAN_FR_RE.find(text).map(|m| compact(m.as_str())),
        total_ttc: grab_total(&SUMMARY_TTC_LABEL_RE, text),
        total_ht: grab_total(&SUMMARY_HT_LABEL_RE, text),
        total_tva: grab_total(&SUMMARY_TVA_LABEL_RE, text),
        currency: detect_currency(text),
    }
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn find_siret(text: &str) -> Option<String> {
    if let Some(c) = SIRET_RE.captures(text) {
        return Some(compact(&c[1]));
    }
    BARE_SIRET_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .or_else(|| BARE_SIREN_RE.captures(text).map(|c| c[1].to_string()))
}

fn grab_total(label: &Regex, text: &str) -> Option<f64> {
    label.find_iter(text).find_map(|m| {
        let rest = &text[m.end()..];
        let line = rest.split('\n').next().unwrap_or(rest);
        let window = match line.char_indices().nth(LABEL_WINDOW_CHARS) {
            Some((i, _)) => &line[..i],
            None => line,
        };
        last_monetary_amount(window)
    })
}

fn detect_currency(text: &str) -> &'static str {
    let upper = text.to_uppercase();
    if text.contains('€') || upper.contains("EUR") {
        "EUR"
    } else if text.contains('$') || upper.contains("USD") {
        "USD"
    } else if text.contains('£') || upper.contains("GBP") {
        "GBP"
    } else {
        "EUR"
    }
}
