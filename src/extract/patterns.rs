//! Regular expressions shared by the extractors

use std::sync::LazyLock;

use regex::Regex;

pub const PATTERNS_VERSION: &str = "v1.0.0";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

// Invoice number

pub static FACTURE_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)(?:facture\s*(?:n°|no\b|num(?:[ée]ro)?\b|#)?\s*[:\-\s]*|invoice\s*(?:no\b|#)?\s*[:\-\s]*)([A-Za-z0-9._\-/]+)",
    )
});
pub static INVOICE_NUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(?:\b(?:n°|no\b|num(?:[ée]ro)?\b)|#)\s*[:\-\s]*([A-Za-z0-9._\-/]+)")
});
pub static SUMMARY_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(?:facture|invoice)\s*(?:n[°o]\s*|#\s*)?[:\s]*([A-Z0-9\-/.]{3,})")
});

// Dates

pub static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?:^|[^0-9])((?:\d{1,2}[./-]){2}\d{2,4}|\d{4}-\d{2}-\d{2})(?:$|[^0-9])")
});
pub static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2})\b")
});
pub static TEXTUAL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(\d{1,2})(?:er)?\s+(janvier|janv|f[ée]vrier|f[ée]vr|mars|avril|avr|mai|juin|juillet|juil|ao[ûu]t|septembre|sept|octobre|oct|novembre|nov|d[ée]cembre|d[ée]c)\.?\s+(\d{4}|\d{2})\b",
    )
});
pub static FACTURE_NEAR_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)facture.{0,40}?(\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2})",
    )
});

// Amounts

/// Amount with mandatory decimals: `1 234,56`, `1.234,56`, `1234.56`
pub static EUR_STRICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:\d{1,3}(?:[ \x{00A0}\x{202F}.]\d{3})+|\d+)[.,]\d{2}\b")
});
/// Any amount-like number, decimals optional
pub static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\d{1,3}(?:[ \x{00A0}\x{202F}.]\d{3})+(?:[,.]\d{2})?|\d+(?:[,.]\d{1,2})?")
});

pub static TOTAL_TTC_NEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)total\s*t\s*t\s*c|\bttc\b|montant\s*ttc"));
pub static TOTAL_HT_NEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)total\s*h\s*t\b|\bht\b|montant\s*ht\b"));
pub static TVA_AMOUNT_NEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\btva\b|\btaxes?\b|\bvat\b"));

pub static SUMMARY_TTC_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)total\s*(?:ttc|€)|montant\s+ttc|total\s+amount|grand\s+total|net\s+[àa]\s+payer")
});
pub static SUMMARY_HT_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)total\s*ht\b|montant\s+ht\b|subtotal|sous-total"));
pub static SUMMARY_TVA_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)total\s+tva|\btva\b|vat\s*total|tax\s*total"));

// Parties

pub static SELLER_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\b(?:vendeur|soci[ée]t[ée]|entreprise|[ée]metteur|from)\b\s*[:\n]+(.{10,300})")
});
pub static CLIENT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?is)\b(?:client|destinataire|acheteur|to)\b\s*[:\n]+(.{10,300})")
});
pub static BLANK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\n[ \t]*\n"));

pub static SELLER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:[ée]metteur|vendeur|seller|from)\b"));
pub static BUYER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:client|acheteur|buyer|destinataire)\b|\bTo\b"));
pub static LABEL_TOTAL_HT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bTotal\s*[HNM][T1]\b"));
pub static LABEL_TOTAL_TTC_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bTotal\s*(?:TT[C€]|T[TC]C?|[àa]\s*payer)"));
pub static LABEL_TVA_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bTVA\b"));

// Identifiers

pub static SIRET_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bSIRET\b\s*(?:n°|no\b)?\s*:?\s*(\d{3}\s?\d{3}\s?\d{3}\s?\d{5})\b")
});
pub static SIREN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bSIREN\b\s*(?:n°|no\b)?\s*:?\s*(\d{3}\s?\d{3}\s?\d{3})\b")
});
pub static BARE_SIRET_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d{14}\b"));
pub static BARE_SIREN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|[^\d])(\d{9})(?:[^\d]|$)"));
/// Intra-community VAT number, French form
pub static VAT_INTRA_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\bFR\s?[0-9A-Z]{2}\s?\d{3}\s?\d{3}\s?\d{3}\b"));
pub static IBAN_FR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\bFR\d{2}(?:\s?[0-9A-Z]{4}){5}\s?[0-9A-Z]{3}\b"));
pub static IBAN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b"));

// Line items

pub static LINE_RX: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?m)^[ \t]*(?:(?P<ref>[A-Z0-9][A-Z0-9_./\-]{2,})[ \t]+)?(?P<label>\S.*?)[ \t]+(?P<qty>\d{1,3})[ \t]+(?P<pu>\d[\d \x{00A0}.]*[.,]\d{2})[ \t]*€?[ \t]+(?P<amt>\d[\d \x{00A0}.]*[.,]\d{2})[ \t]*€?[ \t]*$",
    )
});
pub static FOOTER_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\btotal\b|sous-total|subtotal|\btva\b|\bvat\b|\bttc\b|\bmontant\b|net\s+[àa]\s+payer|\biban\b|\bbic\b|\bsiret\b|\bsiren\b|\bpage\s+\d+|\bconditions\b|p[ée]nalit|[ée]ch[ée]ance|\bacompte\b",
    )
});
/// A text table cell: words separated by single spaces
pub static TEXT_CELL_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"[^ \t]+(?: [^ \t]+)*"));

pub static DIGITS_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"[^\d]"));
pub static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d{4}-\d{2}-\d{2}\b"));
pub static IBAN_FR_COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\bFR\d{12,}"));
pub static SIRET_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d{9,14}\b"));
