//! Tesseract TSV output parsing
//!
//! Columns: `level page_num block_num par_num line_num word_num left top width height conf text`.
//! Only level-5 rows carry words.

use super::types::OcrWord;

/// Parsed TSV: reconstructed text, words and mean word confidence
#[derive(Debug, Default)]
pub struct TsvPage {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f64,
}

struct Row<'a> {
    block: u32,
    par: u32,
    line: u32,
    word: OcrWord,
    raw_text: &'a str,
}

fn parse_row(line: &str) -> Option<Row<'_>> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 12 || cols[0] != "5" {
        return None;
    }
    let raw_text = cols[11].trim();
    if raw_text.is_empty() {
        return None;
    }
    let num = |i: usize| cols[i].trim().parse::<u32>().ok();

    Some(Row {
        block: num(2)?,
        par: num(3)?,
        line: num(4)?,
        word: OcrWord {
            text: raw_text.to_string(),
            confidence: cols[10].trim().parse::<f64>().unwrap_or(-1.0),
            left: num(6)?,
            top: num(7)?,
            width: num(8)?,
            height: num(9)?,
        },
        raw_text,
    })
}

/// Parse tesseract's TSV output
pub fn parse_tsv(tsv: &str) -> TsvPage {
    let mut page = TsvPage::default();
    let mut current: Option<(u32, u32, u32)> = None;
    let mut conf_sum = 0.0;
    let mut conf_count = 0usize;

    // First line is the header
    for row in tsv.lines().skip(1).filter_map(parse_row) {
        let key = (row.block, row.par, row.line);
        match current {
            Some((block, _, _)) if block != row.block => page.text.push_str("\n\n"),
            Some(prev) if prev != key => page.text.push('\n'),
            Some(_) => page.text.push(' '),
            None => {}
        }
        current = Some(key);

        page.text.push_str(row.raw_text);
        if row.word.confidence >= 0.0 {
            conf_sum += row.word.confidence;
            conf_count += 1;
        }
        page.words.push(row.word);
    }

    if conf_count > 0 {
        page.confidence = conf_sum / conf_count as f64;
    }
    page
}
