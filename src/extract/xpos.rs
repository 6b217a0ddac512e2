//! Line items from word positions: header detection, column bounds, bands

use std::collections::BTreeMap;

use super::amounts::{header_role, norm_header_cell, HeaderRole};
use super::lines::{column_at, column_bounds, dedupe, row_from_columns, InvoiceLine};
use super::patterns::FOOTER_NOISE_RE;
use crate::pdf::{PageText, Word};

const MIN_HEADER_SCORE: usize = 3;
/// Words whose centers differ by less than this share a row
const ROW_TOLERANCE: f32 = 2.0;
const BODY_MARGIN: i32 = 5;
const BAND_GAP: i32 = 6;

struct Row<'a> {
    y: i32,
    words: Vec<&'a Word>,
}

impl Row<'_> {
    fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| norm_header_cell(&w.text))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn group_rows(words: &[Word]) -> Vec<Row<'_>> {
    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| a.y_mid().total_cmp(&b.y_mid()));

    let mut rows: Vec<(f32, Row<'_>)> = Vec::new();
    for w in sorted {
        match rows.last_mut() {
            Some((y0, row)) if w.y_mid() - *y0 < ROW_TOLERANCE => row.words.push(w),
            _ => rows.push((
                w.y_mid(),
                Row {
                    y: w.y_mid() as i32,
                    words: vec![w],
                },
            )),
        }
    }
    rows.into_iter()
        .map(|(_, mut row)| {
            row.words.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            row
        })
        .collect()
}

/// Header roles present in a row, first word per role
fn header_hits<'a>(row: &Row<'a>) -> BTreeMap<HeaderRole, &'a Word> {
    let mut hits = BTreeMap::new();
    for w in &row.words {
        if let Some(role) = header_role(&w.text) {
            hits.entry(role).or_insert(*w);
        }
    }
    hits
}

fn parse_page(page: &PageText) -> Vec<InvoiceLine> {
    let rows = group_rows(&page.words);

    let Some((header_at, hits)) = rows.iter().enumerate().find_map(|(i, row)| {
        let hits = header_hits(row);
        (hits.len() >= MIN_HEADER_SCORE).then_some((i, hits))
    }) else {
        return Vec::new();
    };
    let header_y = rows[header_at].y;
    let total_y = rows[header_at + 1..]
        .iter()
        .find(|r| r.text().contains("total"))
        .map(|r| r.y);

    let columns = column_bounds(hits.iter().map(|(role, w)| (*role, w.x_mid())).collect());

    let in_body = |y: i32| y > header_y + BODY_MARGIN && total_y.map_or(true, |t| y < t - BODY_MARGIN);

    // Wrapped labels: rows close to a band's first row join it
    let mut bands: Vec<(i32, Vec<&Word>)> = Vec::new();
    for row in rows.iter().filter(|r| in_body(r.y)) {
        match bands.last_mut() {
            Some((y0, words)) if (row.y - *y0).abs() <= BAND_GAP => {
                words.extend(row.words.iter().copied())
            }
            _ => bands.push((row.y, row.words.clone())),
        }
    }

    bands
        .iter()
        .filter(|(_, words)| {
            let text: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
            !FOOTER_NOISE_RE.is_match(&text.join(" "))
        })
        .filter_map(|(_, words)| {
            row_from_columns(
                words
                    .iter()
                    .filter_map(|w| column_at(&columns, w.x_mid()).map(|role| (role, w.text.as_str()))),
            )
        })
        .collect()
}

/// Rows from every page, duplicates across pages removed
pub fn parse_lines_by_xpos(pages: &[PageText]) -> Vec<InvoiceLine> {
    dedupe(pages.iter().flat_map(parse_page).collect())
}
