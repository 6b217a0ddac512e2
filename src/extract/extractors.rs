//! Candidate producers
//!
//! Every extractor reads the same document view and proposes values for
//! the fields it knows about. Scoring and arbitration happen in the
//! orchestrator.

use super::amounts::{find_amounts, round2, AmountMatch};
use super::candidates::{Candidate, Field, Source};
use super::fields::fill_fields_from_text;
use super::lines::InvoiceLine;
use super::patterns::{
    BUYER_LABEL_RE, LABEL_TOTAL_HT_RE, LABEL_TOTAL_TTC_RE, LABEL_TVA_RE, SELLER_LABEL_RE,
};
use super::summary::summarize_from_text;

/// What extractors see of a document
#[derive(Debug, Clone, Copy)]
pub struct ExtractorInput<'a> {
    pub text: &'a str,
    pub lines: &'a [InvoiceLine],
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, input: &ExtractorInput<'_>) -> Vec<Candidate>;
}

/// Extractors run on every document, in order
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(RulesRegex),
        Box::new(SummaryHeuristics),
        Box::new(LabelProximity),
        Box::new(TotalsFromLines),
    ]
}

fn push_text(out: &mut Vec<Candidate>, field: Field, value: Option<String>, conf: f64, source: Source) {
    if let Some(v) = value {
        out.push(Candidate::new(field, v, conf, source));
    }
}

fn push_amount(out: &mut Vec<Candidate>, field: Field, value: Option<f64>, conf: f64, source: Source) {
    if let Some(v) = value {
        out.push(Candidate::new(field, v, conf, source));
    }
}

/// Field-by-field regex rules
pub struct RulesRegex;

impl RulesRegex {
    const CONF: f64 = 0.9;
}

impl Extractor for RulesRegex {
    fn name(&self) -> &'static str {
        "rules_regex"
    }

    fn extract(&self, input: &ExtractorInput<'_>) -> Vec<Candidate> {
        let raw = fill_fields_from_text(input.text);
        let (conf, src) = (Self::CONF, Source::Regex);
        let mut out = Vec::new();
        push_text(&mut out, Field::InvoiceNumber, raw.invoice_number, conf, src);
        push_text(&mut out, Field::InvoiceDate, raw.invoice_date, conf, src);
        push_amount(&mut out, Field::TotalHt, raw.total_ht, conf, src);
        push_amount(&mut out, Field::TotalTva, raw.total_tva, conf, src);
        push_amount(&mut out, Field::TotalTtc, raw.total_ttc, conf, src);
        push_text(&mut out, Field::Seller, raw.seller, conf, src);
        push_text(&mut out, Field::Buyer, raw.buyer, conf, src);
        push_text(&mut out, Field::SellerSiret, raw.seller_siret, conf, src);
        push_text(&mut out, Field::SellerSiren, raw.seller_siren, conf, src);
        push_text(&mut out, Field::SellerTva, raw.seller_tva, conf, src);
        push_text(&mut out, Field::SellerIban, raw.seller_iban, conf, src);
        out
    }
}

/// Whole-text heuristics with ISO dates and currency detection
pub struct SummaryHeuristics;

impl SummaryHeuristics {
    const CONF: f64 = 0.85;
}

impl Extractor for SummaryHeuristics {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn extract(&self, input: &ExtractorInput<'_>) -> Vec<Candidate> {
        let s = summarize_from_text(input.text);
        let (conf, src) = (Self::CONF, Source::Summary);
        let mut out = Vec::new();
        push_text(&mut out, Field::InvoiceNumber, s.invoice_number, conf, src);
        push_text(
            &mut out,
            Field::InvoiceDate,
            s.invoice_date.map(|d| d.format("%Y-%m-%d").to_string()),
            conf,
            src,
        );
        push_text(&mut out, Field::SellerTva, s.seller_tva, conf, src);
        push_text(&mut out, Field::SellerSiret, s.seller_siret, conf, src);
        push_text(&mut out, Field::SellerIban, s.seller_iban, conf, src);
        push_amount(&mut out, Field::TotalHt, s.total_ht, conf, src);
        push_amount(&mut out, Field::TotalTva, s.total_tva, conf, src);
        push_amount(&mut out, Field::TotalTtc, s.total_ttc, conf, src);
        push_text(&mut out, Field::Currency, Some(s.currency.to_string()), conf, src);
        out
    }
}

/// Values found right after a label line
pub struct LabelProximity;

impl LabelProximity {
    const PARTY_CONF: f64 = 0.7;
    const PARTY_LINES: usize = 4;
    const PARTY_MAX_CHARS: usize = 220;
    /// Lines after the label line searched for an amount
    const AMOUNT_LOOKAHEAD: usize = 2;

    fn party(lines: &[&str], idx: usize) -> Option<String> {
        let end = (idx + 1 + Self::PARTY_LINES).min(lines.len());
        let chunk = lines.get(idx + 1..end)?.join(" ");
        let chunk = chunk.trim();
        (!chunk.is_empty()).then(|| chunk.chars().take(Self::PARTY_MAX_CHARS).collect())
    }

    fn amount_near(lines: &[&str], idx: usize) -> Option<f64> {
        let end = (idx + 1 + Self::AMOUNT_LOOKAHEAD).min(lines.len());
        let buf = lines[idx..end].join(" ");
        find_amounts(&buf)
            .into_iter()
            .find(AmountMatch::is_monetary)
            .map(|m| m.value)
    }
}

impl Extractor for LabelProximity {
    fn name(&self) -> &'static str {
        "label_proximity"
    }

    fn extract(&self, input: &ExtractorInput<'_>) -> Vec<Candidate> {
        let lines: Vec<&str> = input.text.lines().filter(|l| !l.trim().is_empty()).collect();
        let src = Source::LabelProximity;
        let mut out = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if SELLER_LABEL_RE.is_match(line) {
                push_text(&mut out, Field::Seller, Self::party(&lines, i), Self::PARTY_CONF, src);
            }
            if BUYER_LABEL_RE.is_match(line) {
                push_text(&mut out, Field::Buyer, Self::party(&lines, i), Self::PARTY_CONF, src);
            }
            if LABEL_TOTAL_HT_RE.is_match(line) {
                push_amount(&mut out, Field::TotalHt, Self::amount_near(&lines, i), 0.75, src);
            }
            if LABEL_TOTAL_TTC_RE.is_match(line) {
                push_amount(&mut out, Field::TotalTtc, Self::amount_near(&lines, i), 0.8, src);
            }
            if LABEL_TVA_RE.is_match(line) {
                push_amount(&mut out, Field::TotalTva, Self::amount_near(&lines, i), 0.7, src);
            }
        }
        out
    }
}

/// Sum of the line item amounts as a pre-tax total
pub struct TotalsFromLines;

impl Extractor for TotalsFromLines {
    fn name(&self) -> &'static str {
        "totals_from_lines"
    }

    fn extract(&self, input: &ExtractorInput<'_>) -> Vec<Candidate> {
        let sum: f64 = input.lines.iter().filter_map(|l| l.amount).sum();
        if input.lines.is_empty() || sum <= 0.0 {
            return Vec::new();
        }
        vec![Candidate::new(Field::TotalHt, round2(sum), 0.65, Source::Table)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::candidates::FieldValue;

    fn input(text: &str) -> ExtractorInput<'_> {
        ExtractorInput { text, lines: &[] }
    }

    fn values(cands: &[Candidate], field: Field) -> Vec<FieldValue> {
        cands
            .iter()
            .filter(|c| c.field == field)
            .map(|c| c.value.clone())
            .collect()
    }

    #[test]
    fn test_label_proximity_parties() {
        let text = "Émetteur\nACME SAS\n\n12 rue des Lilas\n75011 Paris\nFR\nAutre ligne";
        let cands = LabelProximity.extract(&input(text));
        assert_eq!(
            values(&cands, Field::Seller),
            vec![FieldValue::from("ACME SAS 12 rue des Lilas 75011 Paris FR")]
        );
        assert!(cands.iter().all(|c| c.conf == 0.7));
    }

    #[test]
    fn test_label_proximity_amount_lookahead() {
        let text = "Total TTC\n\n(en euros)\n1 440,00 €\nTVA 20 %\n240,00";
        let cands = LabelProximity.extract(&input(text));
        assert_eq!(values(&cands, Field::TotalTtc), vec![FieldValue::Amount(1440.0)]);
        assert_eq!(values(&cands, Field::TotalTva), vec![FieldValue::Amount(240.0)]);
    }

    #[test]
    fn test_totals_from_lines() {
        let lines = vec![
            InvoiceLine {
                reference: None,
                label: "A".into(),
                qty: Some(1),
                unit_price: Some(10.0),
                amount: Some(10.005),
            },
            InvoiceLine {
                reference: None,
                label: "B".into(),
                qty: None,
                unit_price: None,
                amount: None,
            },
        ];
        let cands = TotalsFromLines.extract(&ExtractorInput { text: "", lines: &lines });
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].source, Source::Table);
        assert_eq!(cands[0].conf, 0.65);
        assert_eq!(TotalsFromLines.extract(&input("")).len(), 0);
    }

    #[test]
    fn test_summary_always_reports_currency() {
        let cands = SummaryHeuristics.extract(&input("rien"));
        assert_eq!(values(&cands, Field::Currency), vec![FieldValue::from("EUR")]);
    }
}
