//! Amount normalisation, text blocks and table header helpers

use std::collections::BTreeMap;

use serde::Serialize;

use super::patterns::{AMOUNT_RE, BLANK_LINE_RE};

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a French or English formatted amount.
///
/// `1 234,56`, `1.234,56`, `1234.56`, `1,234.56` and `120,00 €` all parse.
/// When both separators appear the right-most one is the decimal separator.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .trim()
        .replace("EUR", "")
        .replace("eur", "")
        .chars()
        .filter(|c| !matches!(c, '€' | ' ' | '\u{00A0}' | '\u{202F}' | '\t'))
        .collect();
    if s.is_empty() {
        return None;
    }

    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    match (commas, dots) {
        (0, 0) => {}
        (_, 0) if commas == 1 => s = s.replace(',', "."),
        (_, 0) => s = s.replace(',', ""),
        (0, 1) => {}
        (0, _) => s = s.replace('.', ""),
        _ => {
            // Both present: the last one is the decimal separator
            let last_comma = s.rfind(',').unwrap_or(0);
            let last_dot = s.rfind('.').unwrap_or(0);
            s = if last_comma > last_dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            };
        }
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite()).map(round2)
}

/// An amount found in free text
#[derive(Debug, Clone, PartialEq)]
pub struct AmountMatch {
    pub raw: String,
    pub value: f64,
    pub has_decimals: bool,
    pub is_percent: bool,
    pub has_currency: bool,
}

impl AmountMatch {
    /// Decimals or a currency suffix, and not a rate
    pub fn is_monetary(&self) -> bool {
        !self.is_percent && (self.has_decimals || self.has_currency)
    }
}

/// Every amount-like number in `text`, left to right
pub fn find_amounts(text: &str) -> Vec<AmountMatch> {
    AMOUNT_RE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let value = parse_amount(raw)?;
            let rest = text[m.end()..].trim_start_matches([' ', '\u{00A0}', '\u{202F}']);
            let has_decimals = raw
                .rfind([',', '.'])
                .map(|i| raw.len() - i - 1 == 2)
                .unwrap_or(false);
            Some(AmountMatch {
                raw: raw.to_string(),
                value,
                has_decimals,
                is_percent: rest.starts_with('%'),
                has_currency: rest.starts_with('€') || rest.to_ascii_uppercase().starts_with("EUR"),
            })
        })
        .collect()
}

/// First monetary amount in `text`
pub fn first_monetary_amount(text: &str) -> Option<f64> {
    find_amounts(text)
        .into_iter()
        .find(AmountMatch::is_monetary)
        .map(|m| m.value)
}

/// Last monetary amount in `text`
pub fn last_monetary_amount(text: &str) -> Option<f64> {
    find_amounts(text)
        .into_iter()
        .filter(AmountMatch::is_monetary)
        .last()
        .map(|m| m.value)
}

/// Trim lines, drop empty ones, keep at most `max_lines`
pub fn clean_block(block: Option<&str>, max_lines: usize) -> Option<String> {
    let block = block?;
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(max_lines)
        .collect();
    let joined = lines.join("\n");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Cut a party block at its first blank line
pub fn first_paragraph(block: &str) -> &str {
    let trimmed = block.trim_start();
    match BLANK_LINE_RE.find(trimmed) {
        Some(m) => &trimmed[..m.start()],
        None => trimmed,
    }
}

/// Column role in an invoice line-item table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRole {
    Ref,
    Label,
    Qty,
    Unit,
    Amount,
}

const HEADER_HINTS: &[(HeaderRole, &[&str])] = &[
    (HeaderRole::Ref, &["ref", "reference", "code", "sku"]),
    (
        HeaderRole::Label,
        &[
            "designation",
            "description",
            "libelle",
            "produit",
            "article",
            "prestation",
            "intitule",
        ],
    ),
    (HeaderRole::Qty, &["qte", "qty", "quantite", "quantity", "qt", "nb"]),
    (
        HeaderRole::Unit,
        &["pu", "prix unitaire", "prix unit", "unitaire", "unit price", "prix", "tarif"],
    ),
    (HeaderRole::Amount, &["montant", "total", "amount", "prix total"]),
];

/// Lowercase, fold French accents, drop punctuation
pub fn norm_header_cell(cell: &str) -> String {
    let folded: String = cell
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => Some('e'),
            'à' | 'â' | 'ä' => Some('a'),
            'ù' | 'û' | 'ü' => Some('u'),
            'ô' | 'ö' => Some('o'),
            'î' | 'ï' => Some('i'),
            'ç' => Some('c'),
            '.' | ':' | '°' | '(' | ')' | '€' | '*' => None,
            c => Some(c),
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hint_matches(cell: &str, hint: &str) -> bool {
    cell == hint
        || cell
            .strip_prefix(hint)
            .is_some_and(|rest| rest.starts_with(' ') || (hint.len() >= 4 && !rest.is_empty()))
}

/// Best role for a header cell; the longest matching hint wins
pub fn header_role(cell: &str) -> Option<HeaderRole> {
    let cell = norm_header_cell(cell);
    if cell.is_empty() {
        return None;
    }
    HEADER_HINTS
        .iter()
        .flat_map(|(role, hints)| hints.iter().map(move |h| (*role, *h)))
        .filter(|(_, hint)| hint_matches(&cell, hint))
        .max_by_key(|(_, hint)| hint.len())
        .map(|(role, _)| role)
}

/// Map header roles to cell indices; the first cell claiming a role keeps it
pub fn map_header_indices<S: AsRef<str>>(cells: &[S]) -> BTreeMap<HeaderRole, usize> {
    let mut roles = BTreeMap::new();
    for (i, cell) in cells.iter().enumerate() {
        if let Some(role) = header_role(cell.as_ref()) {
            roles.entry(role).or_insert(i);
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1 234,56"), Some(1234.56));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1234.56"), Some(1234.56));
        assert_eq!(parse_amount("120,00 €"), Some(120.0));
        assert_eq!(parse_amount("1\u{202F}000,5"), Some(1000.5));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount("-45,10"), Some(-45.1));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_find_amounts_flags() {
        let found = find_amounts("TVA 20 % 40,00 € total 1200 EUR");
        assert_eq!(found.len(), 3);
        assert!(found[0].is_percent);
        assert!(found[1].has_decimals && found[1].has_currency);
        assert!(!found[2].has_decimals && found[2].has_currency);
        assert_eq!(first_monetary_amount("TVA 20 % 40,00 €"), Some(40.0));
        assert_eq!(last_monetary_amount("40,00 puis 1 200,00"), Some(1200.0));
        assert_eq!(first_monetary_amount("N° TVA FR12345678901"), None);
    }

    #[test]
    fn test_clean_block() {
        let block = "  ACME SAS \n\n 12 rue des Lilas\n75011 Paris\na\nb\nc\nd";
        assert_eq!(
            clean_block(Some(block), 6).as_deref(),
            Some("ACME SAS\n12 rue des Lilas\n75011 Paris\na\nb\nc")
        );
        assert_eq!(clean_block(Some(" \n "), 6), None);
        assert_eq!(clean_block(None, 6), None);
    }

    #[test]
    fn test_first_paragraph() {
        assert_eq!(
            first_paragraph(" ACME SAS\n1 rue X\n\nClient:\nBob"),
            "ACME SAS\n1 rue X"
        );
    }

    #[test]
    fn test_header_roles() {
        assert_eq!(header_role("Réf."), Some(HeaderRole::Ref));
        assert_eq!(header_role("Désignation"), Some(HeaderRole::Label));
        assert_eq!(header_role("Qté"), Some(HeaderRole::Qty));
        assert_eq!(header_role("P.U. HT"), Some(HeaderRole::Unit));
        assert_eq!(header_role("Prix unitaire HT"), Some(HeaderRole::Unit));
        assert_eq!(header_role("Prix total"), Some(HeaderRole::Amount));
        assert_eq!(header_role("Montant HT"), Some(HeaderRole::Amount));
        assert_eq!(header_role("puissance"), None);
        assert_eq!(header_role("Date"), None);
    }

    #[test]
    fn test_map_header_indices() {
        let idx = map_header_indices(&["Réf", "Désignation", "Qté", "PU HT", "Montant HT"]);
        assert_eq!(idx.get(&HeaderRole::Ref), Some(&0));
        assert_eq!(idx.get(&HeaderRole::Amount), Some(&4));
        assert_eq!(idx.len(), 5);
    }
}
