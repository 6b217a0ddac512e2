//! Invoice line items
//!
//! Three strategies are tried in order, the first one yielding rows wins:
//! positioned words (`xpos`), text columns (`table`) and a per-line regex.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::amounts::{map_header_indices, parse_amount, round2, HeaderRole};
use super::patterns::{DIGITS_ONLY_RE, FOOTER_NOISE_RE, LINE_RX, TEXT_CELL_RE};
use super::xpos::parse_lines_by_xpos;
use crate::pdf::PageText;

const MIN_HEADER_ROLES: usize = 3;
const MAX_QTY: u32 = 999;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub label: String,
    pub qty: Option<u32>,
    pub unit_price: Option<f64>,
    pub amount: Option<f64>,
}

type LineKey = (Option<String>, String, Option<u32>, Option<u64>, Option<u64>);

impl InvoiceLine {
    fn key(&self) -> LineKey {
        (
            self.reference.clone(),
            self.label.clone(),
            self.qty,
            self.unit_price.map(f64::to_bits),
            self.amount.map(f64::to_bits),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinesStrategy {
    Xpos,
    Table,
    Regex,
    None,
}

/// Line items with the strategy that found them
pub fn extract_lines(pages: &[PageText], text: &str) -> (LinesStrategy, Vec<InvoiceLine>) {
    let rows = parse_lines_by_xpos(pages);
    if !rows.is_empty() {
        return (LinesStrategy::Xpos, rows);
    }
    let rows = parse_lines_columns(text);
    if !rows.is_empty() {
        return (LinesStrategy::Table, rows);
    }
    let rows = parse_lines_regex(text);
    if !rows.is_empty() {
        return (LinesStrategy::Regex, rows);
    }
    (LinesStrategy::None, Vec::new())
}

pub fn parse_lines_regex(text: &str) -> Vec<InvoiceLine> {
    let rows = LINE_RX
        .captures_iter(text)
        .filter_map(|c| {
            if FOOTER_NOISE_RE.is_match(&c[0]) {
                return None;
            }
            let label = c["label"].trim();
            // An all-letter "ref" is the first word of the label
            let (reference, label) = match c.name("ref").map(|m| m.as_str()) {
                Some(r) if r.chars().any(|ch| ch.is_ascii_digit()) => {
                    (Some(r.to_string()), label.to_string())
                }
                Some(r) => (None, format!("{} {}", r, label)),
                None => (None, label.to_string()),
            };
            Some(InvoiceLine {
                reference,
                label,
                qty: c["qty"].parse().ok(),
                unit_price: parse_amount(&c["pu"]),
                amount: parse_amount(&c["amt"]),
            })
        })
        .collect();
    dedupe(rows)
}

struct TextCell<'a> {
    text: &'a str,
    /// Center, in characters from the start of the line
    center: f32,
}

fn split_cells(line: &str) -> Vec<TextCell<'_>> {
    TEXT_CELL_RE
        .find_iter(line)
        .map(|m| {
            let start = line[..m.start()].chars().count() as f32;
            let len = m.as_str().chars().count() as f32;
            TextCell {
                text: m.as_str(),
                center: start + len / 2.0,
            }
        })
        .collect()
}

/// A table column, spanning halfway to its neighbours
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Column {
    pub role: HeaderRole,
    pub left: f32,
    pub right: f32,
}

/// Column bounds from header cell centers
pub(crate) fn column_bounds(mut centers: Vec<(HeaderRole, f32)>) -> Vec<Column> {
    centers.sort_by(|a, b| a.1.total_cmp(&b.1));
    centers
        .iter()
        .enumerate()
        .map(|(i, &(role, x))| Column {
            role,
            left: match i {
                0 => f32::NEG_INFINITY,
                _ => (centers[i - 1].1 + x) / 2.0,
            },
            right: centers
                .get(i + 1)
                .map(|next| (next.1 + x) / 2.0)
                .unwrap_or(f32::INFINITY),
        })
        .collect()
}

pub(crate) fn column_at(columns: &[Column], x: f32) -> Option<HeaderRole> {
    columns
        .iter()
        .find(|c| c.left <= x && x < c.right)
        .map(|c| c.role)
}

/// Rows of a text table whose columns are separated by runs of spaces.
///
/// Each cell goes to the header column whose span contains its center.
pub fn parse_lines_columns(text: &str) -> Vec<InvoiceLine> {
    let lines: Vec<(&str, Vec<TextCell<'_>>)> =
        text.lines().map(|l| (l, split_cells(l))).collect();

    let Some((header_at, columns)) = lines.iter().enumerate().find_map(|(i, (_, cells))| {
        let texts: Vec<&str> = cells.iter().map(|c| c.text).collect();
        let roles = map_header_indices(&texts);
        (roles.len() >= MIN_HEADER_ROLES).then(|| {
            let centers = roles
                .into_iter()
                .map(|(role, idx)| (role, cells[idx].center))
                .collect();
            (i, column_bounds(centers))
        })
    }) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for (raw, cells) in &lines[header_at + 1..] {
        if raw.to_lowercase().contains("total") {
            break;
        }
        if cells.is_empty() || FOOTER_NOISE_RE.is_match(raw) {
            continue;
        }
        let assigned = cells
            .iter()
            .filter_map(|c| column_at(&columns, c.center).map(|role| (role, c.text)));
        if let Some(row) = row_from_columns(assigned) {
            rows.push(row);
        }
    }
    dedupe(rows)
}

/// Join the texts assigned to each column and build the row
pub(crate) fn row_from_columns<'a>(
    cells: impl IntoIterator<Item = (HeaderRole, &'a str)>,
) -> Option<InvoiceLine> {
    let mut by_role: BTreeMap<HeaderRole, Vec<&str>> = BTreeMap::new();
    for (role, text) in cells {
        by_role.entry(role).or_default().push(text);
    }
    let get = |role: HeaderRole| by_role.get(&role).map(|t| t.join(" ")).unwrap_or_default();
    build_row(
        &get(HeaderRole::Ref),
        &get(HeaderRole::Label),
        &get(HeaderRole::Qty),
        &get(HeaderRole::Unit),
        &get(HeaderRole::Amount),
    )
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_qty(s: &str) -> Option<u32> {
    let digits = DIGITS_ONLY_RE.replace_all(s, "");
    digits.parse::<u32>().ok().filter(|q| *q <= MAX_QTY)
}

/// Turn raw cell texts into a line item, or `None` for noise and empty rows
fn build_row(
    reference: &str,
    label: &str,
    qty: &str,
    unit_price: &str,
    amount: &str,
) -> Option<InvoiceLine> {
    let reference = non_empty(reference);
    let label = non_empty(label);
    let row_text = format!(
        "{} {}",
        label.as_deref().unwrap_or(""),
        reference.as_deref().unwrap_or("")
    );
    if FOOTER_NOISE_RE.is_match(&row_text) {
        return None;
    }

    let qty = parse_qty(qty);
    let unit_price = parse_amount(unit_price);
    let amount = parse_amount(amount);
    // A bare quantity is not a row
    if label.is_none() && reference.is_none() && unit_price.is_none() && amount.is_none() {
        return None;
    }

    let amount = match (amount, unit_price, qty) {
        (None, Some(pu), Some(q)) => Some(round2(pu * f64::from(q))),
        (amount, _, _) => amount,
    };
    let label = label.or_else(|| reference.clone()).unwrap_or_default();

    Some(InvoiceLine {
        reference,
        label,
        qty,
        unit_price,
        amount,
    })
}

pub(crate) fn dedupe(rows: Vec<InvoiceLine>) -> Vec<InvoiceLine> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.key())).collect()
}
