//! Date recognition and ISO normalisation

use chrono::{Datelike, NaiveDate};

use super::patterns::{FACTURE_NEAR_DATE_RE, NUMERIC_DATE_RE, TEXTUAL_DATE_RE};

const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2100;

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

fn expand_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

/// Parse `DD/MM/YYYY`, `DD-MM-YY`, `DD.MM.YYYY` or `YYYY-MM-DD`
pub fn parse_numeric_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<i32> = parts
        .iter()
        .map(|p| p.parse::<i32>().ok())
        .collect::<Option<_>>()?;

    let (year, month, day) = if parts[0].len() == 4 {
        (nums[0], nums[1], nums[2])
    } else {
        (expand_year(nums[2]), nums[1], nums[0])
    };

    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day).and_then(plausible)
}

/// French month name or abbreviation to month number
pub fn french_month(name: &str) -> Option<u32> {
    let n = name.to_lowercase();
    let month = match n.as_str() {
        s if s.starts_with("janv") => 1,
        s if s.starts_with("fév") || s.starts_with("fev") => 2,
        s if s.starts_with("mars") => 3,
        s if s.starts_with("avr") => 4,
        "mai" => 5,
        "juin" => 6,
        s if s.starts_with("juil") => 7,
        s if s.starts_with("aoû") || s.starts_with("aou") => 8,
        s if s.starts_with("sep") => 9,
        s if s.starts_with("oct") => 10,
        s if s.starts_with("nov") => 11,
        s if s.starts_with("déc") || s.starts_with("dec") => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_textual_date(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let day = day.parse::<u32>().ok()?;
    let year = expand_year(year.parse::<i32>().ok()?);
    let month = french_month(month)?;
    NaiveDate::from_ymd_opt(year, month, day).and_then(plausible)
}

/// Find the invoice date in free text.
///
/// A date within 40 characters after "facture" wins; otherwise the most
/// recent valid date, numeric or written out in French.
pub fn find_invoice_date(text: &str) -> Option<NaiveDate> {
    let text = text.replace(['\u{202F}', '\u{00A0}'], " ");

    if let Some(date) = FACTURE_NEAR_DATE_RE
        .captures_iter(&text)
        .filter_map(|c| parse_numeric_date(&c[1]))
        .next()
    {
        return Some(date);
    }

    let numeric = NUMERIC_DATE_RE
        .find_iter(&text)
        .filter_map(|m| parse_numeric_date(m.as_str()));
    let textual = TEXTUAL_DATE_RE
        .captures_iter(&text)
        .filter_map(|c| parse_textual_date(&c[1], &c[2], &c[3]));

    numeric.chain(textual).max()
}
