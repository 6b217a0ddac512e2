//! Candidate weighting and field resolution

use std::collections::BTreeMap;

use serde::Serialize;

use super::amounts::round2;
use super::candidates::{Candidate, Field, FieldValue, Source};
use super::extractors::{Extractor, ExtractorInput};
use super::validators::soft_validate;

const ALTERNATIVES: usize = 2;
const MAX_DERIVED_TVA: f64 = 2_000_000.0;

/// Confidence after source weight and validity
pub fn weigh(candidate: &Candidate) -> f64 {
    let validity = soft_validate(candidate.field, &candidate.value);
    (candidate.conf * candidate.source.weight() * validity).clamp(0.0, 1.0)
}

/// Run every extractor and weigh its candidates; worthless ones are dropped
pub fn run_extractors(extractors: &[Box<dyn Extractor>], input: &ExtractorInput<'_>) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for extractor in extractors {
        let found = extractor.extract(input);
        tracing::trace!(extractor = extractor.name(), candidates = found.len(), "extractor ran");
        candidates.extend(found.into_iter().filter_map(|mut c| {
            c.conf = weigh(&c);
            (c.conf > 0.0).then_some(c)
        }));
    }
    candidates
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub value: FieldValue,
    pub conf: f64,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConfidence {
    pub value: FieldValue,
    pub conf: f64,
    pub source: Source,
    pub alts: Vec<Alternative>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub fields: BTreeMap<Field, FieldValue>,
    pub confidences: BTreeMap<Field, FieldConfidence>,
    /// Fields computed from other totals rather than read
    pub derived: Vec<Field>,
}

/// Pick the best candidate per field, then fill in missing totals
pub fn resolve_fields(candidates: Vec<Candidate>) -> Resolution {
    let mut by_field: BTreeMap<Field, Vec<Candidate>> = BTreeMap::new();
    for c in candidates {
        by_field.entry(c.field).or_default().push(c);
    }

    let mut resolution = Resolution::default();
    for (field, mut list) in by_field {
        // Stable: ties keep extractor order
        list.sort_by(|a, b| b.conf.total_cmp(&a.conf));
        let mut ranked = list.into_iter();
        let Some(top) = ranked.next() else {
            continue;
        };
        let alts = ranked
            .take(ALTERNATIVES)
            .map(|a| Alternative {
                value: a.value,
                conf: round3(a.conf),
                source: a.source,
            })
            .collect();

        let value = match (field.is_total(), top.value.as_amount()) {
            (true, Some(v)) => FieldValue::Amount(v),
            _ => top.value.clone(),
        };
        resolution.fields.insert(field, value);
        resolution.confidences.insert(
            field,
            FieldConfidence {
                value: top.value,
                conf: round3(top.conf),
                source: top.source,
                alts,
            },
        );
    }

    derive_totals(&mut resolution);
    resolution
}

fn derive_totals(resolution: &mut Resolution) {
    let amount = |r: &Resolution, f: Field| r.fields.get(&f).and_then(FieldValue::as_amount);
    let ht = amount(resolution, Field::TotalHt);
    let tva = amount(resolution, Field::TotalTva);
    let ttc = amount(resolution, Field::TotalTtc);

    if let (Some(ht), Some(tva), None) = (ht, tva, ttc) {
        resolution
            .fields
            .insert(Field::TotalTtc, FieldValue::Amount(round2(ht + tva)));
        resolution.derived.push(Field::TotalTtc);
    }
    if let (Some(ht), None, Some(ttc)) = (ht, tva, ttc) {
        let diff = round2(ttc - ht);
        if (0.0..=MAX_DERIVED_TVA).contains(&diff) {
            resolution.fields.insert(Field::TotalTva, FieldValue::Amount(diff));
            resolution.derived.push(Field::TotalTva);
        }
    }
}
