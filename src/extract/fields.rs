//! Rule based field extraction over the full document text

use regex::Regex;

use super::amounts::{clean_block, first_paragraph, parse_amount};
use super::patterns::{
    CLIENT_BLOCK_RE, DATE_RE, EUR_STRICT_RE, FACTURE_NO_RE, IBAN_FR_RE, IBAN_RE,
    INVOICE_NUM_RE, SELLER_BLOCK_RE, SIREN_RE, SIRET_RE, TOTAL_HT_NEAR_RE,
    TOTAL_TTC_NEAR_RE, TVA_AMOUNT_NEAR_RE, VAT_INTRA_RE,
};

const PARTY_MAX_LINES: usize = 6;

/// Fields found by the regex rules, untouched by any scoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub invoice_number: Option<String>,
    /// Raw date token as it appears in the text
    pub invoice_date: Option<String>,
    pub total_ht: Option<f64>,
    pub total_tva: Option<f64>,
    pub total_ttc: Option<f64>,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub seller_siret: Option<String>,
    pub seller_siren: Option<String>,
    pub seller_tva: Option<String>,
    pub seller_iban: Option<String>,
}

pub fn fill_fields_from_text(text: &str) -> RawFields {
    let (total_ht, total_tva, total_ttc) = extract_totals(text);
    RawFields {
        invoice_number: extract_invoice_number(text),
        invoice_date: DATE_RE.captures(text).map(|c| c[1].to_string()),
        total_ht,
        total_tva,
        total_ttc,
        seller: extract_party(&SELLER_BLOCK_RE, text),
        buyer: extract_party(&CLIENT_BLOCK_RE, text),
        seller_siret: first_group(&SIRET_RE, text).map(|s| strip_spaces(&s)),
        seller_siren: first_group(&SIREN_RE, text).map(|s| strip_spaces(&s)),
        seller_tva: VAT_INTRA_RE.find(text).map(|m| strip_spaces(m.as_str())),
        seller_iban: IBAN_FR_RE
            .find(text)
            .or_else(|| IBAN_RE.find(text))
            .map(|m| strip_spaces(m.as_str())),
    }
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// First labelled token that contains a digit
pub(crate) fn labelled_token(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-', '/']))
        .find(|t| t.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn extract_invoice_number(text: &str) -> Option<String> {
    labelled_token(&FACTURE_NO_RE, text).or_else(|| labelled_token(&INVOICE_NUM_RE, text))
}

fn extract_totals(text: &str) -> (Option<f64>, Option<f64>, Option<f64>) {
    let (mut ht, mut tva, mut ttc) = (None, None, None);
    for line in text.lines() {
        let slot = if TOTAL_TTC_NEAR_RE.is_match(line) {
            &mut ttc
        } else if TOTAL_HT_NEAR_RE.is_match(line) {
            &mut ht
        } else if TVA_AMOUNT_NEAR_RE.is_match(line) {
            &mut tva
        } else {
            continue;
        };
        if let Some(value) = EUR_STRICT_RE.find(line).and_then(|m| parse_amount(m.as_str())) {
            *slot = Some(value);
        }
    }
    (ht, tva, ttc)
}

fn extract_party(re: &Regex, text: &str) -> Option<String> {
    let block = re.captures(text)?.get(1)?.as_str();
    clean_block(Some(first_paragraph(block)), PARTY_MAX_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = "\
Vendeur :
ACME SAS
12 rue des Lilas
75011 Paris

Client :
Dupont SARL
3 avenue Foch
69000 Lyon

Facture N° FA-2024-0042
Date : 12/03/2024
SIRET : 732 829 320 00074
N° TVA : FR40 732829320
Total HT 1 000,00 €
TVA 20 % 200,00 €
Total TTC 1 200,00 €
IBAN : FR76 3000 6000 0112 3456 7890 189
";

    #[test]
    fn test_fill_fields() {
        let raw = fill_fields_from_text(INVOICE);
        assert_eq!(raw.invoice_number.as_deref(), Some("FA-2024-0042"));
        assert_eq!(raw.invoice_date.as_deref(), Some("12/03/2024"));
        assert_eq!(raw.total_ht, Some(1000.0));
        assert_eq!(raw.total_tva, Some(200.0));
        assert_eq!(raw.total_ttc, Some(1200.0));
        assert_eq!(raw.seller_siret.as_deref(), Some("73282932000074"));
        assert_eq!(raw.seller_siren, None);
        assert_eq!(raw.seller_tva.as_deref(), Some("FR40732829320"));
        assert_eq!(raw.seller_iban.as_deref(), Some("FR7630006000011234567890189"));
    }

    #[test]
    fn test_parties_stop_at_blank_line() {
        let raw = fill_fields_from_text(INVOICE);
        assert_eq!(
            raw.seller.as_deref(),
            Some("ACME SAS\n12 rue des Lilas\n75011 Paris")
        );
        assert_eq!(raw.buyer.as_deref(), Some("Dupont SARL\n3 avenue Foch\n69000 Lyon"));
    }

    #[test]
    fn test_invoice_number_needs_digit() {
        let raw = fill_fields_from_text("FACTURE\nDate du jour\nRéférence n° 7781");
        assert_eq!(raw.invoice_number.as_deref(), Some("7781"));
    }

    #[test]
    fn test_last_total_line_wins() {
        let raw = fill_fields_from_text("Total TTC 10,00\nTotal TTC 12,50\n");
        assert_eq!(raw.total_ttc, Some(12.5));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(fill_fields_from_text(""), RawFields::default());
    }
}
