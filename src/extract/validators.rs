//! Plausibility scores for candidate values

use super::candidates::{Field, FieldValue};
use super::patterns::{IBAN_FR_COMPACT_RE, ISO_DATE_RE, SIRET_DIGITS_RE};

const MAX_PLAUSIBLE_TOTAL: f64 = 5_000_000.0;

/// Quality multiplier in 0..=1 for a candidate value
pub fn soft_validate(field: Field, value: &FieldValue) -> f64 {
    if value.is_empty() {
        return 0.0;
    }

    if field.is_total() {
        return match value.as_amount() {
            Some(v) if (-1e-6..=MAX_PLAUSIBLE_TOTAL).contains(&v) => 1.0,
            Some(_) => 0.6,
            None => 0.0,
        };
    }

    let s = value.to_string();
    match field {
        Field::InvoiceDate => {
            if ISO_DATE_RE.is_match(&s) {
                0.9
            } else {
                0.6
            }
        }
        Field::SellerIban => {
            if IBAN_FR_COMPACT_RE.is_match(&s.replace(' ', "")) {
                1.0
            } else {
                0.7
            }
        }
        Field::SellerSiret => {
            if SIRET_DIGITS_RE.is_match(&s) {
                1.0
            } else {
                0.6
            }
        }
        Field::Seller | Field::Buyer => {
            if s.trim().chars().count() >= 8 {
                0.9
            } else {
                0.5
            }
        }
        _ => 0.8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_score_zero() {
        assert_eq!(soft_validate(Field::Seller, &FieldValue::from("")), 0.0);
        assert_eq!(soft_validate(Field::TotalHt, &FieldValue::from("n/a")), 0.0);
    }

    #[test]
    fn test_totals_range() {
        assert_eq!(soft_validate(Field::TotalTtc, &FieldValue::Amount(120.0)), 1.0);
        assert_eq!(soft_validate(Field::TotalTtc, &FieldValue::from("1 200,00")), 1.0);
        assert_eq!(soft_validate(Field::TotalHt, &FieldValue::Amount(9e6)), 0.6);
        assert_eq!(soft_validate(Field::TotalTva, &FieldValue::Amount(-3.0)), 0.6);
    }

    #[test]
    fn test_field_specific_rules() {
        assert_eq!(soft_validate(Field::InvoiceDate, &"2024-03-12".into()), 0.9);
        assert_eq!(soft_validate(Field::InvoiceDate, &"12/03/2024".into()), 0.6);
        assert_eq!(
            soft_validate(Field::SellerIban, &"FR76 3000 6000 0112 3456 7890 189".into()),
            1.0
        );
        assert_eq!(soft_validate(Field::SellerIban, &"DE89370400440532013000".into()), 0.7);
        assert_eq!(soft_validate(Field::SellerSiret, &"73282932000074".into()), 1.0);
        assert_eq!(soft_validate(Field::SellerSiret, &"1234".into()), 0.6);
        assert_eq!(soft_validate(Field::Buyer, &"ACME SAS Paris".into()), 0.9);
        assert_eq!(soft_validate(Field::Buyer, &"Bob".into()), 0.5);
        assert_eq!(soft_validate(Field::Currency, &"EUR".into()), 0.8);
    }
}
